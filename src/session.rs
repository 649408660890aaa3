use crate::client::ClientConfig;
use crate::credentials::Credentials;
use crate::error::{AnalyticsError, Result};
use crate::jwt::mint_assertion;
use crate::time::{Clock, SystemClock};
use crate::token::{BearerToken, TokenResponse};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Transport};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Placeholder resolved to the configured company id in every URL
pub const COMPANY_ID_PLACEHOLDER: &str = "{company_id}";

/// Query parameters and body of a single call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query string pairs, in order
    pub query: Vec<(String, String)>,
    /// JSON request body
    pub json: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append several query parameters
    pub fn query_pairs<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query.extend(pairs);
        self
    }

    /// Set the JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Dispatches calls with the headers of one bearer token.
///
/// Rebuilt every time the session refreshes its token.
struct AuthorizedCaller {
    transport: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
}

impl AuthorizedCaller {
    fn new(transport: Arc<dyn Transport>, credentials: &Credentials, access_token: &str) -> Self {
        let headers = vec![
            ("x-api-key".to_string(), credentials.client_id.clone()),
            ("x-proxy-global-company-id".to_string(), credentials.company_id.clone()),
            ("Authorization".to_string(), format!("Bearer {}", access_token)),
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        AuthorizedCaller { transport, headers }
    }

    fn call(&self, method: HttpMethod, url: String, options: RequestOptions) -> Result<HttpResponse> {
        let request = HttpRequest {
            method,
            url,
            headers: self.headers.clone(),
            query: options.query,
            body: options.json.map(RequestBody::Json).unwrap_or(RequestBody::Empty),
        };
        self.transport.execute(request)
    }
}

/// Token slot: at most one live token and the caller built for it
struct AuthState {
    token: BearerToken,
    caller: Arc<AuthorizedCaller>,
}

/// Authenticated session for the JWT service-account flow.
///
/// Holds the credentials, mints assertions, exchanges them for a bearer token,
/// and refreshes the token before any call that would otherwise use an
/// expired one. The expiry check and the refresh run under one lock, so
/// concurrent callers wait for a single in-flight exchange.
pub struct TokenSession {
    credentials: Credentials,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<AuthState>>,
    refreshes: AtomicU64,
}

impl TokenSession {
    /// Create a session using the blocking reqwest transport and the wall clock
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(credentials, config, transport, Arc::new(SystemClock)))
    }

    /// Create a session with a custom transport and clock
    pub fn with_transport(
        credentials: Credentials,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TokenSession {
            credentials,
            config,
            transport,
            clock,
            state: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Session credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Expiry of the held token, if any
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.lock_state().as_ref().map(|s| s.token.expires_at())
    }

    /// Number of token exchanges performed so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Mint a signed assertion valid for a few seconds
    pub fn mint_assertion(&self) -> Result<String> {
        mint_assertion(&self.credentials, self.clock.now())
    }

    /// Exchange a fresh assertion for a bearer token.
    ///
    /// Transient network failures are retried per the configured policy;
    /// a rejection by the authentication service is returned immediately.
    pub fn exchange_for_bearer_token(&self) -> Result<TokenResponse> {
        let assertion = self.mint_assertion()?;
        let form = vec![
            ("client_id".to_string(), self.credentials.client_id.clone()),
            ("client_secret".to_string(), self.credentials.client_secret.clone()),
            ("jwt_token".to_string(), assertion),
        ];

        let response = self.config.retry.run("token exchange", || {
            let mut request = HttpRequest::new(HttpMethod::Post, self.config.exchange_endpoint.clone());
            request.body = RequestBody::Form(form.clone());
            self.transport.execute(request)
        })?;

        if !response.is_success() {
            return Err(AnalyticsError::authentication(&response.body));
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Dispatch an authenticated call with a verb given by name.
    ///
    /// The verb is validated before any network activity.
    pub fn request(&self, method: &str, url_template: &str, options: RequestOptions) -> Result<HttpResponse> {
        let method: HttpMethod = method.parse()?;
        self.send(method, url_template, options)
    }

    /// Dispatch an authenticated call.
    ///
    /// Refreshes the token first when none is held or the held one has
    /// expired, then resolves the company id placeholder in `url_template`.
    pub fn send(&self, method: HttpMethod, url_template: &str, options: RequestOptions) -> Result<HttpResponse> {
        let caller = self.authorized_caller()?;
        let url = self.resolve_url(url_template);
        debug!(%method, %url, "sending request");
        caller.call(method, url, options)
    }

    /// Dispatch an authenticated call, retrying transient failures of the
    /// call itself per the configured policy.
    ///
    /// The token is obtained once up front; the exchange has its own retries
    /// and is not repeated by this loop.
    pub fn send_with_retry(
        &self,
        what: &str,
        method: HttpMethod,
        url_template: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let caller = self.authorized_caller()?;
        let url = self.resolve_url(url_template);
        self.config.retry.run(what, || {
            debug!(%method, %url, "sending request");
            caller.call(method, url.clone(), options.clone())
        })
    }

    /// Replace the company id placeholder with the configured company id
    pub fn resolve_url(&self, url_template: &str) -> String {
        url_template.replace(COMPANY_ID_PLACEHOLDER, &self.credentials.company_id)
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<AuthState>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn authorized_caller(&self) -> Result<Arc<AuthorizedCaller>> {
        let mut state = self.lock_state();
        let now = self.clock.now();

        if let Some(current) = state.as_ref() {
            if !current.token.is_expired(now) {
                return Ok(current.caller.clone());
            }
            debug!(expired_at = %current.token.expires_at(), "bearer token expired");
        }

        let response = self.exchange_for_bearer_token()?;
        let token = BearerToken::from_response(&response, self.clock.now());
        let caller = Arc::new(AuthorizedCaller::new(
            self.transport.clone(),
            &self.credentials,
            token.access_token(),
        ));
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!(expires_at = %token.expires_at(), "obtained bearer token");

        *state = Some(AuthState {
            token,
            caller: caller.clone(),
        });
        Ok(caller)
    }
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .field("token_expiry", &self.token_expiry())
            .finish()
    }
}
