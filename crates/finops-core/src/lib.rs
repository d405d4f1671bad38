//! # FinOps Core
//!
//! Domain model and pure computation for the FinOps engine: entity types,
//! configuration, the pricing tables used for monthly cost estimates, and
//! the heuristic analyzers that turn observed resources into
//! recommendations.
//!
//! Everything in this crate is I/O-free. The cloud, persistence and
//! scheduling layers live in their own crates and depend on this one.

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analyzers;
pub mod config;
pub mod error;
pub mod inputs;
pub mod model;
pub mod pricing;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{
    Confidence, JobRun, JobStatus, Recommendation, RecommendationDraft, RecommendationStatus,
    RecommendationType, Resource, ResourceRecord, Workspace, WorkspaceStatus,
};
