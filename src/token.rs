use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token returned by the JWT exchange endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Token type (usually "bearer")
    #[serde(rename = "token_type")]
    pub token_type: String,

    /// Access token for API requests
    #[serde(rename = "access_token")]
    pub access_token: String,

    /// Token lifetime in milliseconds
    #[serde(rename = "expires_in")]
    pub expires_in: i64,
}

/// The bearer token held by a session, with its absolute expiry.
#[derive(Clone)]
pub struct BearerToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// Create a token from an exchange response received at `now`.
    ///
    /// A lifetime too large to represent saturates at the latest
    /// representable instant.
    pub fn from_response(response: &TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = Duration::try_milliseconds(response.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        BearerToken {
            access_token: response.access_token.clone(),
            expires_at,
        }
    }

    /// Access token value
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Instant after which the token must not be used
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is expired once its expiry lies strictly before `now`;
    /// expiring exactly at `now` still counts as valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
