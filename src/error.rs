use serde_json::Value;
use thiserror::Error;

/// Main error type for Analytics API operations
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Credentials are missing required fields
    #[error("config has insufficient information, missing: {}", .missing.join(" "))]
    Config { missing: Vec<String> },

    /// The `aud` value does not end in a client id segment
    #[error("aud is wrongly formatted: {0:?}")]
    MalformedAudience(String),

    /// A required credentials field holds an array or object
    #[error("config field {0} must be a string, number or boolean")]
    InvalidField(String),

    /// Token exchange was rejected by the authentication service
    #[error("authentication failed: {error}\n{description}")]
    Authentication { error: String, description: String },

    /// Unsupported HTTP verb
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    /// Non-200 response from an API endpoint
    #[error("ErrorId: {error_id}\nErrorCode: {error_code}\nErrorDescription: {error_description}")]
    Api {
        status: u16,
        error_id: String,
        error_code: String,
        error_description: String,
    },

    /// Failed response from the reports endpoint
    #[error("report request failed (HTTP {status})\nErrorId: {error_id}\nErrorCode: {error_code}\nErrorDescription: {error_description}")]
    Report {
        status: u16,
        error_id: String,
        error_code: String,
        error_description: String,
    },

    /// Report query payload is not usable
    #[error("invalid report query: {0}")]
    InvalidQuery(String),

    /// A table row does not line up with the table columns
    #[error("row {row} has {found} values, expected {expected}")]
    ShapeMismatch {
        row: String,
        expected: usize,
        found: usize,
    },

    /// Transient transport failure (timeout or connection error)
    #[error("network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Assertion signing error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// IO error (unreadable config or private key)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic fields the API puts in error bodies
struct Diagnostics {
    error_id: String,
    error_code: String,
    error_description: String,
}

impl Diagnostics {
    fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Diagnostics {
                error_id: field(map.get("errorId")),
                error_code: field(map.get("errorCode")),
                error_description: field(map.get("errorDescription")),
            },
            _ => Diagnostics {
                error_id: "unknown".to_string(),
                error_code: "unknown".to_string(),
                error_description: body.to_string(),
            },
        }
    }
}

fn field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

impl AnalyticsError {
    /// Create an API error from a failed response body
    pub fn api(status: u16, body: &str) -> Self {
        let d = Diagnostics::from_body(body);
        AnalyticsError::Api {
            status,
            error_id: d.error_id,
            error_code: d.error_code,
            error_description: d.error_description,
        }
    }

    /// Create a report error from a failed response body
    pub fn report(status: u16, body: &str) -> Self {
        let d = Diagnostics::from_body(body);
        AnalyticsError::Report {
            status,
            error_id: d.error_id,
            error_code: d.error_code,
            error_description: d.error_description,
        }
    }

    /// Create an authentication error from a rejected token exchange body
    pub fn authentication(body: &str) -> Self {
        let (error, description) = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => (field(map.get("error")), field(map.get("error_description"))),
            _ => ("unknown".to_string(), body.to_string()),
        };
        AnalyticsError::Authentication { error, description }
    }

    /// Get the HTTP status code if this error came from a server response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AnalyticsError::Api { status, .. } | AnalyticsError::Report { status, .. } => {
                Some(*status)
            }
            AnalyticsError::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalyticsError::Network(_))
    }
}

/// Result type for Analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_missing_fields() {
        let error = AnalyticsError::Config {
            missing: vec!["sub".to_string(), "companyId".to_string()],
        };
        assert!(error.to_string().ends_with("missing: sub companyId"));
    }

    #[test]
    fn test_api_error_from_body() {
        let body = r#"{"errorId":"a1b2","errorCode":"invalid_parameter","errorDescription":"limit is too large"}"#;
        let error = AnalyticsError::api(400, body);

        let message = error.to_string();
        assert!(message.contains("a1b2"));
        assert!(message.contains("invalid_parameter"));
        assert!(message.contains("limit is too large"));
        assert_eq!(error.status_code(), Some(400));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_api_error_from_non_json_body() {
        let error = AnalyticsError::api(502, "Bad Gateway");
        match error {
            AnalyticsError::Api {
                error_id,
                error_description,
                ..
            } => {
                assert_eq!(error_id, "unknown");
                assert_eq!(error_description, "Bad Gateway");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_error_code_is_kept() {
        let error = AnalyticsError::report(500, r#"{"errorId":"x","errorCode":500,"errorDescription":"boom"}"#);
        assert!(error.to_string().contains("ErrorCode: 500"));
    }

    #[test]
    fn test_authentication_error_from_body() {
        let error = AnalyticsError::authentication(
            r#"{"error":"invalid_client","error_description":"invalid client secret"}"#,
        );
        assert_eq!(
            error.to_string(),
            "authentication failed: invalid_client\ninvalid client secret"
        );
    }

    #[test]
    fn test_network_error_is_transient() {
        assert!(AnalyticsError::Network("timed out".to_string()).is_transient());
    }
}
