//! # FinOps Database Layer
//!
//! SQLite-based persistence with sqlx: the resource inventory, the
//! deduplicated recommendation set, workspaces and job runs.
//!
//! ## Modules
//!
//! - [`pool`] - Database connection pool
//! - [`models`] - Database row models
//! - [`repo`] - Repository layer with the idempotent upserts
//! - [`error`] - Database error types

#![warn(missing_docs)]

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod models;
pub mod pool;
pub mod repo;

pub use error::{DbError, Result};
pub use models::{JobRunRow, RecommendationRow, ResourceRow, WorkspaceRow};
pub use pool::DbPool;
pub use repo::{JobRunRepo, RecommendationRepo, ResourceRepo, WorkspaceRepo};
