#![allow(dead_code)]

use marketingcloud::{ClientConfig, RetryPolicy};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: &str = include_str!("../fixtures/test_key.pem");

pub const SCOPE: &str = "https://ims-na1.adobelogin.com/s/ent_analytics_bulk_ingest_sdk";

/// Write a private key and a credentials file into `dir`, returning the credentials path
pub fn write_credentials(dir: &Path) -> PathBuf {
    let key_path = dir.join("private.key");
    std::fs::write(&key_path, TEST_KEY).unwrap();

    let credentials = json!({
        "iss": "XYZ@AdobeOrg",
        "sub": "XYZ@techacct.adobe.com",
        SCOPE: true,
        "aud": "https://ims-na1.adobelogin.com/c/client42",
        "privateKeyPath": key_path.to_str().unwrap(),
        "clientSecret": "shh",
        "companyId": "acme"
    });
    let credentials_path = dir.join("credentials.json");
    std::fs::write(&credentials_path, credentials.to_string()).unwrap();
    credentials_path
}

/// Client configuration pointing every endpoint at the mock server
pub fn config(server_uri: &str) -> ClientConfig {
    ClientConfig::default()
        .with_exchange_endpoint(format!("{}/ims/exchange/jwt", server_uri))
        .with_base_url(format!("{}/api/{{company_id}}", server_uri))
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        })
}

/// Answer every token exchange with `access_token`
pub async fn mount_token(server: &MockServer, access_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/ims/exchange/jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "bearer",
            "access_token": access_token,
            "expires_in": 86_399_994
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}
