//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows plus insert payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: ractor actor owning the pool; handlers talk to it through `DbActorHandle`

pub mod actor;
pub mod models;
pub mod schema;

pub use models::{
    AnalysisCreate, AnalysisSource, ApiLogCreate, DbAnalysis, DbApiLog, DbFeedback, DbPin,
    DbUser, FeedbackCreate,
};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};
