use std::error;
use std::fmt;

/// Convenient result type for mirror operations using [`RegsyncError`] as the error type.
pub type RegsyncResult<T> = Result<T, RegsyncError>;

/// Main error type for mirror operations.
///
/// [`RegsyncError`] can represent single errors, errors with additional
/// detail, or multiple aggregated errors. The kind drives retry and
/// failure-scoping decisions throughout the pipeline.
#[derive(Debug, Clone)]
pub struct RegsyncError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
///
/// Users should not interact with this type directly but use [`RegsyncError`] methods instead.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Error with kind and static description
    WithDescription(ErrorKind, &'static str),
    /// Error with kind, static description, and dynamic detail
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    /// Multiple aggregated errors
    Many(Vec<RegsyncError>),
}

/// Specific categories of errors that can occur during a mirror run.
///
/// The kind determines how an error is handled: [`ErrorKind::Throttled`] is
/// the only retryable registry failure, [`ErrorKind::UpdateConflict`] drives
/// the workload conflict-retry loop, and [`ErrorKind::ResourceNotFound`] is
/// treated as an empty result by listing call sites.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Registry API errors
    RegistryRequestFailed,
    Throttled,
    AuthenticationFailed,

    // Cluster API errors
    ClusterRequestFailed,
    UpdateConflict,
    ResourceNotFound,

    // Container runtime errors
    CommandFailed,

    // Cancellation & configuration
    OperationCanceled,
    ConfigError,

    // IO & serialization errors
    IoError,
    SerializationError,
    DeserializationError,

    // Unknown / uncategorized
    Unknown,
}

impl RegsyncError {
    /// Creates a [`RegsyncError`] containing multiple aggregated errors.
    pub fn many(errors: Vec<RegsyncError>) -> RegsyncError {
        RegsyncError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|e| e.detail()),
            _ => None,
        }
    }
}

impl PartialEq for RegsyncError {
    fn eq(&self, other: &RegsyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for RegsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;

                Ok(())
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)?;

                Ok(())
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")?;
                } else if errors.len() == 1 {
                    errors[0].fmt(f)?;
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl error::Error for RegsyncError {}

/// Creates a [`RegsyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for RegsyncError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> RegsyncError {
        RegsyncError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

/// Creates a [`RegsyncError`] from an error kind, static description, and dynamic detail.
impl From<(ErrorKind, &'static str, String)> for RegsyncError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> RegsyncError {
        RegsyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

/// Creates a [`RegsyncError`] from a vector of errors for aggregation.
impl<E> From<Vec<E>> for RegsyncError
where
    E: Into<RegsyncError>,
{
    fn from(errors: Vec<E>) -> RegsyncError {
        RegsyncError {
            repr: ErrorRepr::Many(errors.into_iter().map(Into::into).collect()),
        }
    }
}

/// Converts [`std::io::Error`] to [`RegsyncError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for RegsyncError {
    fn from(err: std::io::Error) -> RegsyncError {
        RegsyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`serde_json::Error`] to [`RegsyncError`] with appropriate error kind.
impl From<serde_json::Error> for RegsyncError {
    fn from(err: serde_json::Error) -> RegsyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            _ => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        RegsyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`reqwest::Error`] to [`RegsyncError`].
///
/// HTTP 429 responses map to the retryable [`ErrorKind::Throttled`]; every
/// other transport or status failure maps to [`ErrorKind::RegistryRequestFailed`].
impl From<reqwest::Error> for RegsyncError {
    fn from(err: reqwest::Error) -> RegsyncError {
        let kind = match err.status() {
            Some(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                ErrorKind::Throttled
            }
            _ => ErrorKind::RegistryRequestFailed,
        };

        RegsyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                kind,
                "registry HTTP request failed",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`kube::Error`] to [`RegsyncError`] with appropriate error kind.
///
/// Maps API error responses by HTTP status code: 409 becomes
/// [`ErrorKind::UpdateConflict`] (driving the conflict-retry loop), 404
/// becomes [`ErrorKind::ResourceNotFound`] (treated as an empty result by
/// listing call sites), and 401/403 become [`ErrorKind::AuthenticationFailed`].
impl From<kube::Error> for RegsyncError {
    fn from(err: kube::Error) -> RegsyncError {
        let (kind, description) = match &err {
            kube::Error::Api(response) => match response.code {
                409 => (ErrorKind::UpdateConflict, "cluster resource version conflict"),
                404 => (ErrorKind::ResourceNotFound, "cluster resource not found"),
                401 | 403 => (
                    ErrorKind::AuthenticationFailed,
                    "cluster request not authorized",
                ),
                _ => (ErrorKind::ClusterRequestFailed, "cluster API request failed"),
            },
            _ => (ErrorKind::ClusterRequestFailed, "cluster API request failed"),
        };

        RegsyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, regsync_error};

    #[test]
    fn test_simple_error_creation() {
        let err = RegsyncError::from((ErrorKind::RegistryRequestFailed, "listing failed"));
        assert_eq!(err.kind(), ErrorKind::RegistryRequestFailed);
        assert_eq!(err.detail(), None);
        assert_eq!(err.kinds(), vec![ErrorKind::RegistryRequestFailed]);
    }

    #[test]
    fn test_error_with_detail() {
        let err = RegsyncError::from((
            ErrorKind::CommandFailed,
            "command exited with a failure status",
            "docker pull app:v1".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert_eq!(err.detail(), Some("docker pull app:v1"));
    }

    #[test]
    fn test_multiple_errors() {
        let errors = vec![
            RegsyncError::from((ErrorKind::Throttled, "throttled")),
            RegsyncError::from((ErrorKind::IoError, "io failed")),
        ];
        let multi_err = RegsyncError::many(errors);

        assert_eq!(multi_err.kind(), ErrorKind::Throttled);
        assert_eq!(
            multi_err.kinds(),
            vec![ErrorKind::Throttled, ErrorKind::IoError]
        );
        assert_eq!(multi_err.detail(), None);
    }

    #[test]
    fn test_empty_multiple_errors() {
        let multi_err = RegsyncError::many(vec![]);
        assert_eq!(multi_err.kind(), ErrorKind::Unknown);
        assert_eq!(multi_err.kinds(), vec![]);
    }

    #[test]
    fn test_error_display_with_detail() {
        let err = RegsyncError::from((
            ErrorKind::RegistryRequestFailed,
            "listing failed",
            "page 3".to_string(),
        ));
        let display_str = format!("{err}");
        assert!(display_str.contains("RegistryRequestFailed"));
        assert!(display_str.contains("listing failed"));
        assert!(display_str.contains("page 3"));
    }

    #[test]
    fn test_macro_usage() {
        let err = regsync_error!(ErrorKind::ConfigError, "invalid configuration");
        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.detail(), None);

        let err_with_detail = regsync_error!(
            ErrorKind::Throttled,
            "registry API throttled the request",
            "ListRepository"
        );
        assert_eq!(err_with_detail.kind(), ErrorKind::Throttled);
        assert!(err_with_detail.detail().unwrap().contains("ListRepository"));
    }

    #[test]
    fn test_bail_macro() {
        fn failing() -> RegsyncResult<i32> {
            bail!(ErrorKind::OperationCanceled, "run aborted");
        }

        let err = failing().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationCanceled);
    }

    #[test]
    fn test_json_error_classification() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = RegsyncError::from(json_err);
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }
}
