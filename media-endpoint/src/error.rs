//! Error types for the media endpoint core

use thiserror::Error;
use watchable::WatchableError;

/// Failure reported by a catalog client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The cancellation token fired, or the call timed out
    #[error("catalog request canceled")]
    Canceled,

    /// The catalog lacks the capability for this operation
    #[error("unsupported catalog operation: {0}")]
    Unsupported(String),

    /// Network or HTTP failure talking to the catalog server
    #[error("catalog transport error: {0}")]
    Transport(String),

    /// The catalog server answered with something unparseable
    #[error("catalog protocol error: {0}")]
    Protocol(String),
}

/// Outcome of a failed endpoint operation
///
/// Transport and protocol failures never reach callers directly: at the task
/// boundary they collapse into `Canceled`. Only `Unsupported` survives as a
/// distinct outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("operation canceled")]
    Canceled,

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The worker pool could not be started
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Watchable(#[from] WatchableError),
}

impl From<CatalogError> for EndpointError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::Unsupported(operation) => EndpointError::Unsupported(operation),
            CatalogError::Canceled | CatalogError::Transport(_) | CatalogError::Protocol(_) => {
                EndpointError::Canceled
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EndpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_errors_collapse_to_canceled() {
        assert_eq!(
            EndpointError::from(CatalogError::Transport("reset".into())),
            EndpointError::Canceled
        );
        assert_eq!(
            EndpointError::from(CatalogError::Protocol("bad json".into())),
            EndpointError::Canceled
        );
        assert_eq!(EndpointError::from(CatalogError::Canceled), EndpointError::Canceled);
    }

    #[test]
    fn test_unsupported_survives_conversion() {
        assert_eq!(
            EndpointError::from(CatalogError::Unsupported("List".into())),
            EndpointError::Unsupported("List".into())
        );
    }
}
