/// Errors surfaced by the backend client and the query cache
///
/// The type is `Clone` so that a single in-flight fetch can hand the same failure to every
/// caller waiting on it.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// HTTP status code, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Schema(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Schema(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_http_404() {
        let err = ClientError::Http {
            status: 404,
            message: "Movie not found".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_other_statuses_are_not_not_found() {
        let err = ClientError::Http {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_not_found());
        assert!(!ClientError::Network("refused".to_string()).is_not_found());
        assert_eq!(ClientError::Network("refused".to_string()).status(), None);
    }

    #[test]
    fn test_serde_error_becomes_schema() {
        let err = serde_json::from_str::<Vec<u64>>("{\"not\": \"a list\"}").unwrap_err();
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Schema(_)));
    }

    #[test]
    fn test_display_includes_status() {
        let err = ClientError::Http {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 502: bad gateway");
    }
}
