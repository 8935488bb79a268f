//! Data models for the search orchestration service

pub mod contact;
pub mod generated_query;
pub mod search_config;
pub mod search_session;

pub use contact::{ExtractedContact, SearchSource, VerificationStatus};
pub use generated_query::{GeneratedQuery, QueryScores};
pub use search_config::{Priority, SearchConfiguration, SearchOptions};
pub use search_session::{ProgressSnapshot, SearchSession, SearchStage, SearchStatus};
