use crate::client::{create_rest_client, ClientConfig};
use crate::error::{AnalyticsError, Result};
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// HTTP verbs the session can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Upper-case verb name
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(AnalyticsError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

/// Request body variants used by the API
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully resolved outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    /// Create a request without headers, query or body
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Look up a header value, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
    /// X-Request-Id header from the response
    pub request_id: Option<String>,
}

impl HttpResponse {
    /// Create a response without request id
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
            request_id: None,
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, an empty body reads as null
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The opaque "send a request, get status and body" capability.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Blocking reqwest transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the timeouts of `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(ReqwestTransport {
            client: create_rest_client(config)?,
        })
    }
}

fn map_send_error(e: reqwest::Error) -> AnalyticsError {
    if e.is_timeout() || e.is_connect() {
        AnalyticsError::Network(e.to_string())
    } else {
        AnalyticsError::Reqwest(e)
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method.into(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(ref value) => builder.json(value),
            RequestBody::Form(ref fields) => builder.form(fields),
        };

        let start = Instant::now();
        let response = builder.send().map_err(map_send_error)?;
        let status = response.status().as_u16();

        let request_id = response
            .headers()
            .get("X-Request-Id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().map_err(map_send_error)?;

        debug!(
            method = %request.method,
            url = %request.url,
            status,
            elapsed = ?start.elapsed(),
            "request completed"
        );

        Ok(HttpResponse {
            status,
            body,
            request_id,
        })
    }
}
