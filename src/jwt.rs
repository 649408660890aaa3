use crate::credentials::Credentials;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lifetime of a minted assertion
pub const ASSERTION_LIFETIME_SECS: i64 = 10;

/// Claims of the service-account assertion
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    exp: i64,
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    /// Requested scopes are flattened into top-level `"<scope url>": true` claims
    #[serde(flatten)]
    scopes: &'a BTreeMap<String, bool>,
}

/// Mint a short-lived RS256 assertion for the token exchange.
///
/// The private key is read from `credentials.private_key_path` on every call,
/// an unreadable key file is reported as [`crate::AnalyticsError::Io`].
pub fn mint_assertion(credentials: &Credentials, now: DateTime<Utc>) -> Result<String> {
    let pem = std::fs::read(&credentials.private_key_path)?;
    let key = EncodingKey::from_rsa_pem(&pem)?;

    let claims = AssertionClaims {
        exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        iss: &credentials.issuer,
        sub: &credentials.subject,
        aud: &credentials.audience,
        scopes: &credentials.scopes,
    };

    let token = encode(&Header::new(Algorithm::RS256), &claims, &key)?;
    Ok(token)
}
