//! Business logic services

pub mod query_deduplicator;
pub mod scheduler;
pub mod search_orchestrator;
