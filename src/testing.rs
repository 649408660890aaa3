//! Scripted transport and fixtures shared by the unit tests.

use crate::credentials::Credentials;
use crate::error::{AnalyticsError, Result};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) const TEST_KEY: &str = include_str!("../tests/fixtures/test_key.pem");

#[derive(Clone)]
enum Scripted {
    Response(HttpResponse),
    Network(String),
}

struct Route {
    method: HttpMethod,
    suffix: String,
    replies: VecDeque<Scripted>,
}

/// Transport answering from scripted replies, matched by method and URL suffix.
///
/// Replies on a route are consumed in order, the last one repeats.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: HttpMethod, suffix: &str, reply: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.suffix == suffix) {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                suffix: suffix.to_string(),
                replies: VecDeque::from(vec![reply]),
            }),
        }
    }

    /// Script a reply for requests whose URL ends with `suffix`
    pub(crate) fn respond(&self, method: HttpMethod, suffix: &str, status: u16, body: Value) {
        self.push(
            method,
            suffix,
            Scripted::Response(HttpResponse::new(status, body.to_string())),
        );
    }

    /// Script a transient network failure
    pub(crate) fn fail(&self, method: HttpMethod, suffix: &str, message: &str) {
        self.push(method, suffix, Scripted::Network(message.to_string()));
    }

    /// Script a successful token exchange
    pub(crate) fn token(&self, access_token: &str, expires_in: i64) {
        self.respond(
            HttpMethod::Post,
            "/ims/exchange/jwt",
            200,
            json!({
                "token_type": "bearer",
                "access_token": access_token,
                "expires_in": expires_in
            }),
        );
    }

    /// All requests seen so far
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose URL ends with `suffix`
    pub(crate) fn count(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && request.url.ends_with(&r.suffix));

        let reply = match route {
            Some(route) if route.replies.len() > 1 => route.replies.pop_front(),
            Some(route) => route.replies.front().cloned(),
            None => None,
        };

        match reply {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Network(message)) => Err(AnalyticsError::Network(message)),
            None => Ok(HttpResponse::new(
                404,
                json!({
                    "errorId": "mock",
                    "errorCode": "no_route",
                    "errorDescription": format!("no scripted reply for {} {}", request.method, request.url)
                })
                .to_string(),
            )),
        }
    }
}

/// Credentials pointing at a private key written into `dir`
pub(crate) fn credentials(dir: &std::path::Path) -> Credentials {
    let key_path = dir.join("private.key");
    std::fs::write(&key_path, TEST_KEY).unwrap();

    Credentials::from_value(json!({
        "iss": "XYZ@AdobeOrg",
        "sub": "XYZ@techacct.adobe.com",
        "https://ims-na1.adobelogin.com/s/ent_analytics_bulk_ingest_sdk": true,
        "aud": "https://ims-na1.adobelogin.com/c/client42",
        "privateKeyPath": key_path.to_str().unwrap(),
        "clientSecret": "shh",
        "companyId": "acme"
    }))
    .unwrap()
}
