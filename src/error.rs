//! SDK error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP status from the API
    #[error("{status} {status_text} from Brandwatch: {message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
        /// The body parsed as JSON, so the server answered deliberately
        json_body: bool,
    },

    /// Success status, but the body carried an `errors` list
    #[error("Brandwatch rejected the request: {0}")]
    ApiErrors(String),

    #[error("Unexpected response from Brandwatch: {0}")]
    UnexpectedResponse(String),

    #[error("Login rejected: {0}")]
    Auth(String),

    #[error("No stored access token: {0}")]
    CredentialsNotFound(String),

    #[error("Project {0} not found")]
    ProjectNotFound(String),

    #[error("Could not find the {resource_type} {reference} in the project")]
    ResourceNotFound {
        resource_type: String,
        reference: String,
    },

    #[error("The resource name {name} is ambiguous: {ids:?}")]
    AmbiguousResource { name: String, ids: Vec<i64> },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request to Brandwatch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client setup failed: {0}")]
    Internal(String),
}

impl Error {
    pub fn api(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            message: message.into(),
            json_body: false,
        }
    }

    /// Error status whose body was valid JSON.
    pub fn api_json(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            message: message.into(),
            json_body: true,
        }
    }

    pub fn not_found(resource_type: impl Into<String>, reference: impl ToString) -> Self {
        Self::ResourceNotFound {
            resource_type: resource_type.into(),
            reference: reference.to_string(),
        }
    }

    /// Rate limiting, server failures without a JSON answer, timeouts and
    /// refused connections.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Api {
                status, json_body, ..
            } => *status == 429 || (!json_body && (500..600).contains(status)),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::api(404, "Not Found", "<html>nope</html>").to_string(),
            "404 Not Found from Brandwatch: <html>nope</html>"
        );
        assert_eq!(
            Error::Auth("Authentication failed: bad password".to_string()).to_string(),
            "Login rejected: Authentication failed: bad password"
        );
        assert_eq!(
            Error::ProjectNotFound("Example project".to_string()).to_string(),
            "Project Example project not found"
        );
    }

    #[test]
    fn test_resource_errors() {
        let not_found = Error::not_found("queries", "My Query");
        assert_eq!(
            not_found.to_string(),
            "Could not find the queries My Query in the project"
        );
        assert!(not_found.is_not_found());

        let ambiguous = Error::AmbiguousResource {
            name: "Query1".to_string(),
            ids: vec![1, 2],
        };
        assert!(ambiguous.to_string().contains("[1, 2]"));
        assert!(!ambiguous.is_not_found());
    }

    #[test]
    fn test_retriable_statuses() {
        for status in [429, 500, 502, 503, 599] {
            assert!(Error::api(status, "", "").is_retriable(), "{}", status);
        }
        for status in [400, 401, 403, 404, 600] {
            assert!(!Error::api(status, "", "").is_retriable(), "{}", status);
        }
    }

    #[test]
    fn test_json_server_errors_not_retriable() {
        assert!(!Error::api_json(500, "Internal Server Error", "{}").is_retriable());
        assert!(!Error::api_json(503, "Service Unavailable", "{}").is_retriable());
        assert!(Error::api_json(429, "Too Many Requests", "{}").is_retriable());
    }

    #[test]
    fn test_local_errors_not_retriable() {
        assert!(!Error::ApiErrors("[]".to_string()).is_retriable());
        assert!(!Error::Auth("invalid".to_string()).is_retriable());
        assert!(!Error::MissingField("name".to_string()).is_retriable());
        assert!(!Error::Unsupported("rename".to_string()).is_retriable());
    }
}
