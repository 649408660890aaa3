use crate::error::{AnalyticsError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Fields that must be present in a credentials file, in reporting order
pub const REQUIRED_FIELDS: [&str; 6] = ["iss", "sub", "aud", "privateKeyPath", "clientSecret", "companyId"];

/// Keys with this prefix are requested scopes (metascopes)
pub const SCOPE_PREFIX: &str = "https:";

/// Service-account credentials for the JWT exchange flow.
///
/// Loaded from a JSON object such as:
///
/// ```json
/// {
///     "iss": "XXXXXX@AdobeOrg",
///     "sub": "XXXXX@techacct.adobe.com",
///     "aud": "https://ims-na1.adobelogin.com/c/XXXXXX",
///     "https://ims-na1.adobelogin.com/s/ent_analytics_bulk_ingest_sdk": true,
///     "privateKeyPath": "/path/to/private.key",
///     "clientSecret": "XXXXXXX",
///     "companyId": "XXXXX"
/// }
/// ```
#[derive(Clone, PartialEq)]
pub struct Credentials {
    /// Technical account organization (`iss`)
    pub issuer: String,
    /// Technical account id (`sub`)
    pub subject: String,
    /// Audience URL (`aud`)
    pub audience: String,
    /// Path of the PEM encoded RSA private key
    pub private_key_path: PathBuf,
    /// Client secret sent with the token exchange
    pub client_secret: String,
    /// Global company id used in API URLs and headers
    pub company_id: String,
    /// Client id, the last path segment of the audience
    pub client_id: String,
    /// Requested scopes, all recorded as `true`
    pub scopes: BTreeMap<String, bool>,
}

impl Credentials {
    /// Load credentials from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load credentials from an already opened source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    /// Build credentials from a parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            _ => {
                return Err(AnalyticsError::Config {
                    missing: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
                })
            }
        };

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| matches!(map.get(**f), None | Some(Value::Null)))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AnalyticsError::Config { missing });
        }

        let get = |key: &str| scalar_field(&map, key);
        let audience = get("aud")?;
        let client_id = client_id_from_audience(&audience)?;

        let scopes = map
            .keys()
            .filter(|k| k.starts_with(SCOPE_PREFIX))
            .map(|k| (k.clone(), true))
            .collect();

        Ok(Credentials {
            issuer: get("iss")?,
            subject: get("sub")?,
            private_key_path: PathBuf::from(get("privateKeyPath")?),
            client_secret: get("clientSecret")?,
            company_id: get("companyId")?,
            client_id,
            audience,
            scopes,
        })
    }
}

/// Text of a present field; numbers and booleans are taken in their JSON form
fn scalar_field(map: &Map<String, Value>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(AnalyticsError::InvalidField(key.to_string())),
    }
}

/// Extract the client id, the trailing non-slash segment of the audience
fn client_id_from_audience(audience: &str) -> Result<String> {
    match audience.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => Ok(segment.to_string()),
        _ => Err(AnalyticsError::MalformedAudience(audience.to_string())),
    }
}

// Keep the client secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("audience", &self.audience)
            .field("private_key_path", &self.private_key_path)
            .field("client_secret", &"<redacted>")
            .field("company_id", &self.company_id)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .finish()
    }
}
