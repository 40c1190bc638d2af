//! Error types shared by the engine and the data-source adapters.

use std::time::Duration;

use thiserror::Error;

/// Failures raised by an external metric source.
///
/// The engine never retries; callers decide what to do with each category.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("query syntax error: {0}")]
    QuerySyntax(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("source timed out after {0} ms")]
    Timeout(u64),
}

/// Core engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Custom range is missing a bound or is reversed.
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    /// Composite score weights do not add up to 100.
    #[error("composite weights must sum to 100, got {0}")]
    InvalidWeights(u32),

    #[error(transparent)]
    Source(#[from] SourceError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl SourceError {
    /// Maps a sqlx error onto a source category.
    ///
    /// SQLSTATE class 42 covers syntax and access-rule violations; 42501 is
    /// the insufficient-privilege code. A pool timeout reports the pool's
    /// `acquire_timeout`.
    pub fn from_sqlx(err: &sqlx::Error, acquire_timeout: Duration) -> Self {
        match err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("42501") => SourceError::PermissionDenied(db.message().to_string()),
                Some(code) if code.starts_with("42") => {
                    SourceError::QuerySyntax(db.message().to_string())
                }
                Some("28000") | Some("28P01") => {
                    SourceError::PermissionDenied(db.message().to_string())
                }
                _ => SourceError::Unavailable(db.message().to_string()),
            },
            sqlx::Error::PoolTimedOut => SourceError::Timeout(acquire_timeout.as_millis() as u64),
            other => SourceError::Unavailable(other.to_string()),
        }
    }
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_timeout() {
        let err = SourceError::from_sqlx(&sqlx::Error::PoolTimedOut, Duration::from_secs(30));
        assert_eq!(err, SourceError::Timeout(30_000));
        assert_eq!(err.to_string(), "source timed out after 30000 ms");
    }

    #[test]
    fn closed_pool_is_unavailable() {
        assert!(matches!(
            SourceError::from_sqlx(&sqlx::Error::PoolClosed, Duration::from_secs(30)),
            SourceError::Unavailable(_)
        ));
    }

    #[test]
    fn source_errors_wrap_transparently() {
        let err: EngineError = SourceError::Timeout(250).into();
        assert_eq!(err.to_string(), "source timed out after 250 ms");
    }
}
