//! HTTP API endpoints

pub mod health;
pub mod searches;
pub mod sse;

pub use health::health_routes;
pub use searches::search_routes;
pub use sse::event_stream;
