//! Error types for finops-engine

use thiserror::Error;

/// Result type alias for finops-engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error types
///
/// Anything surfacing here from inside a job is fatal for that job and
/// lands verbatim in `JobRun.error_message`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Cloud layer failure
    #[error(transparent)]
    Cloud(#[from] finops_cloud::CloudError),

    /// Persistence failure
    #[error(transparent)]
    Db(#[from] finops_db::DbError),

    /// The configured cron expression did not parse
    #[error("invalid cron expression '{expr}': {message}")]
    Cron {
        /// The offending expression
        expr: String,
        /// Parser error text
        message: String,
    },
}
