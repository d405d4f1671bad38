//! Error types for finops-cloud

use thiserror::Error;

/// Result type alias for finops-cloud operations
pub type Result<T> = std::result::Result<T, CloudError>;

/// Cloud layer error types
///
/// `AssumeRole` is fatal for a job; `Api` failures are contained per call
/// and surface either as a failed analysis path or as a collector error
/// string, depending on where they happen.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Cross-account role assumption failed
    #[error("failed to assume role {role_arn}: {message}")]
    AssumeRole {
        /// Role that was requested
        role_arn: String,
        /// Underlying STS error text
        message: String,
    },

    /// A service API call failed
    #[error("{service}: {message}")]
    Api {
        /// Service the call belonged to
        service: &'static str,
        /// Underlying error text, source chain included
        message: String,
    },

    /// Connection test failed
    #[error("connection test failed: {0}")]
    Connection(String),
}

impl CloudError {
    /// Build an `Api` error from any error value, flattening its source chain
    pub fn api<E>(service: &'static str, err: E) -> Self
    where
        E: std::error::Error,
    {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Api { service, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_flattens_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = CloudError::api("EC2", inner);
        let text = err.to_string();
        assert!(text.starts_with("EC2: "));
        assert!(text.contains("socket timed out"));
    }
}
