//! # FinOps Cloud
//!
//! Everything that talks to (or stands in for) the cloud provider:
//!
//! - [`client::CloudClient`]: the capability set the analysis path runs
//!   against, with a live AWS implementation ([`live::AwsCloudClient`]) and
//!   a deterministic in-memory one ([`mock::MockCloudClient`]).
//! - [`collect`]: the sixteen inventory collectors and the batched
//!   dispatcher that fans them out.
//! - [`credentials`]: cross-account role assumption with a cached
//!   short-lived credential set.

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod client;
pub mod collect;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod live;
pub mod mock;

pub use client::CloudClient;
pub use collect::{run_collectors, Collect, CollectionOutcome};
pub use credentials::{AwsSession, RoleCredentials};
pub use error::{CloudError, Result};
pub use factory::{ClientFactory, LiveFactory, MockFactory, WorkspaceCloud};
pub use live::AwsCloudClient;
pub use mock::MockCloudClient;
