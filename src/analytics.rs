use crate::client::ClientConfig;
use crate::credentials::Credentials;
use crate::error::{AnalyticsError, Result};
use crate::session::{RequestOptions, TokenSession};
use crate::transport::HttpMethod;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Ordered query parameters for an endpoint call.
///
/// Endpoint defaults are filled in with [`Params::or`] and never override a
/// value the caller already set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value for the same key
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }

    /// Set a parameter only if it is not present yet
    pub fn or(self, key: &str, value: impl ToString) -> Self {
        if self.get(key).is_some() {
            self
        } else {
            self.set(key, value)
        }
    }

    /// Value of a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

const DEFAULT_LOCALE: &str = "en_US";

/// Client for the Analytics 2.0 REST endpoints.
///
/// Every endpoint returns the response JSON. Only HTTP 200 counts as
/// success, anything else becomes [`AnalyticsError::Api`] carrying the
/// server's `errorId`, `errorCode` and `errorDescription`.
#[derive(Debug)]
pub struct Analytics {
    session: TokenSession,
}

impl Analytics {
    /// Create a client from credentials and configuration
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        Ok(Analytics {
            session: TokenSession::new(credentials, config)?,
        })
    }

    /// Create a client from a credentials file with the default configuration
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Credentials::from_path(path)?, ClientConfig::default())
    }

    /// Wrap an existing session
    pub fn with_session(session: TokenSession) -> Self {
        Analytics { session }
    }

    /// Underlying authenticated session
    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.session.config().base_url, endpoint)
    }

    fn call(&self, method: HttpMethod, endpoint: &str, params: Params, body: Option<&Value>) -> Result<Value> {
        let mut options = RequestOptions::new().query_pairs(params.into_pairs());
        if let Some(body) = body {
            options = options.json(body.clone());
        }

        let response = self.session.send(method, &self.url(endpoint), options)?;
        if response.status != 200 {
            return Err(AnalyticsError::api(response.status, &response.body));
        }
        response.json()
    }

    // Calculated metrics

    /// List calculated metrics
    pub fn get_calculated_metrics(&self, params: Params) -> Result<Value> {
        let params = params
            .or("locale", DEFAULT_LOCALE)
            .or("limit", 10)
            .or("page", 0)
            .or("sortDirection", "ASC")
            .or("sortProperty", "id");
        self.call(HttpMethod::Get, "/calculatedmetrics", params, None)
    }

    /// Create a calculated metric
    pub fn create_calculated_metric(&self, body: &Value, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Post, "/calculatedmetrics", params, Some(body))
    }

    /// List the functions usable in calculated metrics
    pub fn get_calculated_metric_functions(&self, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, "/calculatedmetrics/functions", params, None)
    }

    /// Get a single calculated metric function
    pub fn get_calculated_metric_function(&self, id: &str, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, &format!("/calculatedmetrics/functions/{}", id), params, None)
    }

    /// Validate a calculated metric definition
    pub fn validate_calculated_metric(&self, body: &Value, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE).or("migrating", false);
        self.call(HttpMethod::Post, "/calculatedmetrics/validate", params, Some(body))
    }

    /// Get a calculated metric
    pub fn get_calculated_metric(&self, id: &str, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, &format!("/calculatedmetrics/{}", id), params, None)
    }

    /// Update a calculated metric
    pub fn update_calculated_metric(&self, id: &str, body: &Value, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Put, &format!("/calculatedmetrics/{}", id), params, Some(body))
    }

    /// Delete a calculated metric
    pub fn delete_calculated_metric(&self, id: &str, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Delete, &format!("/calculatedmetrics/{}", id), params, None)
    }

    // Collections

    /// List report suites
    pub fn get_collection_suites(&self, params: Params) -> Result<Value> {
        let params = params.or("limit", 10).or("page", 0);
        self.call(HttpMethod::Get, "/collections/suites", params, None)
    }

    /// Get a report suite
    pub fn get_collection_suite(&self, id: &str) -> Result<Value> {
        self.call(HttpMethod::Get, &format!("/collections/suites/{}", id), Params::new(), None)
    }

    // Date ranges

    /// List date ranges
    pub fn get_date_ranges(&self, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE).or("limit", 10).or("page", 0);
        self.call(HttpMethod::Get, "/dateranges", params, None)
    }

    /// Get a date range
    pub fn get_date_range(&self, id: &str, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, &format!("/dateranges/{}", id), params, None)
    }

    // Dimensions

    /// List the dimensions of a report suite
    pub fn get_dimensions(&self, rsid: &str, params: Params) -> Result<Value> {
        let params = params
            .set("rsid", rsid)
            .or("locale", DEFAULT_LOCALE)
            .or("classifiable", false);
        self.call(HttpMethod::Get, "/dimensions", params, None)
    }

    /// Get a dimension of a report suite
    pub fn get_dimension(&self, id: &str, rsid: &str, params: Params) -> Result<Value> {
        let params = params.set("rsid", rsid).or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, &format!("/dimensions/{}", id), params, None)
    }

    // Metrics

    /// List the metrics of a report suite
    pub fn get_metrics(&self, rsid: &str, params: Params) -> Result<Value> {
        let params = params
            .set("rsid", rsid)
            .or("locale", DEFAULT_LOCALE)
            .or("segmentable", false);
        self.call(HttpMethod::Get, "/metrics", params, None)
    }

    /// Get a metric of a report suite
    pub fn get_metric(&self, id: &str, rsid: &str, params: Params) -> Result<Value> {
        let params = params.set("rsid", rsid).or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, &format!("/metrics/{}", id), params, None)
    }

    // Reports

    /// Run a report query, one page per call.
    ///
    /// Any 2xx is a success here; a failure becomes [`AnalyticsError::Report`].
    /// Transient network failures are retried per the configured policy.
    pub fn reports(&self, query: &Value) -> Result<Value> {
        let url = self.url("/reports");
        let response = self.session.send_with_retry(
            "report request",
            HttpMethod::Post,
            &url,
            RequestOptions::new().json(query.clone()),
        )?;

        if !response.is_success() {
            return Err(AnalyticsError::report(response.status, &response.body));
        }
        debug!(status = response.status, "report page received");
        response.json()
    }

    // Segments

    /// List segments
    pub fn get_segments(&self, params: Params) -> Result<Value> {
        let params = params
            .or("locale", DEFAULT_LOCALE)
            .or("filterByPublishedSegments", "all")
            .or("limit", 10)
            .or("page", 0)
            .or("sortDirection", "ASC")
            .or("sortProperty", "id");
        self.call(HttpMethod::Get, "/segments", params, None)
    }

    /// Create a segment
    pub fn create_segment(&self, body: &Value, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Post, "/segments", params, Some(body))
    }

    /// Validate a segment definition against a report suite
    pub fn validate_segment(&self, rsid: &str, body: &Value) -> Result<Value> {
        let params = Params::new().set("rsid", rsid);
        self.call(HttpMethod::Post, "/segments/validate", params, Some(body))
    }

    /// Get a segment
    pub fn get_segment(&self, id: &str, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Get, &format!("/segments/{}", id), params, None)
    }

    /// Update a segment
    pub fn update_segment(&self, id: &str, body: &Value, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Put, &format!("/segments/{}", id), params, Some(body))
    }

    /// Delete a segment
    pub fn delete_segment(&self, id: &str, params: Params) -> Result<Value> {
        let params = params.or("locale", DEFAULT_LOCALE);
        self.call(HttpMethod::Delete, &format!("/segments/{}", id), params, None)
    }

    // Users

    /// List users of the company
    pub fn get_users(&self, params: Params) -> Result<Value> {
        let params = params.or("limit", 0).or("page", 0);
        self.call(HttpMethod::Get, "/users", params, None)
    }

    /// Get the user the session is authenticated as
    pub fn get_current_user(&self) -> Result<Value> {
        self.call(HttpMethod::Get, "/users/me", Params::new(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::testing::{self, MockTransport};
    use crate::time::SystemClock;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: Arc<MockTransport>, dir: &Path) -> Analytics {
        transport.token("test_token", 86_399_994);
        let config = ClientConfig::default().with_retry(RetryPolicy {
            initial_delay: std::time::Duration::from_millis(1),
            ..RetryPolicy::default()
        });
        let session = TokenSession::with_transport(
            testing::credentials(dir),
            config,
            transport,
            Arc::new(SystemClock),
        );
        Analytics::with_session(session)
    }

    fn last_call(transport: &MockTransport) -> crate::transport::HttpRequest {
        transport.requests().pop().unwrap()
    }

    #[test]
    fn test_params_defaults_do_not_override() {
        let params = Params::new().set("limit", 50).or("limit", 10).or("page", 0);
        assert_eq!(params.get("limit"), Some("50"));
        assert_eq!(params.get("page"), Some("0"));

        let params = params.set("limit", 5);
        assert_eq!(params.get("limit"), Some("5"));
        assert!(!params.is_empty());
    }

    #[test]
    fn test_get_calculated_metrics_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Get, "/calculatedmetrics", 200, json!({"content": []}));
        let analytics = client(transport.clone(), dir.path());

        let body = analytics.get_calculated_metrics(Params::new().set("limit", 25)).unwrap();
        assert_eq!(body, json!({"content": []}));

        let call = last_call(&transport);
        assert_eq!(call.url, "https://analytics.adobe.io/api/acme/calculatedmetrics");
        let expected: Vec<(String, String)> = [
            ("limit", "25"),
            ("locale", "en_US"),
            ("page", "0"),
            ("sortDirection", "ASC"),
            ("sortProperty", "id"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(call.query, expected);
    }

    #[test]
    fn test_non_200_raises_api_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            HttpMethod::Get,
            "/segments",
            403,
            json!({
                "errorId": "4c6b1a",
                "errorCode": "access_denied",
                "errorDescription": "not allowed"
            }),
        );
        let analytics = client(transport, dir.path());

        let error = analytics.get_segments(Params::new()).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("4c6b1a"));
        assert!(message.contains("access_denied"));
        assert!(message.contains("not allowed"));
        assert_eq!(error.status_code(), Some(403));
    }

    #[test]
    fn test_crud_success_is_strictly_200() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Post, "/segments", 201, json!({"id": "s_1"}));
        let analytics = client(transport, dir.path());

        let result = analytics.create_segment(&json!({"name": "x"}), Params::new());
        assert!(matches!(result, Err(AnalyticsError::Api { status: 201, .. })));
    }

    #[test]
    fn test_update_segment_sends_body() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Put, "/segments/s_1", 200, json!({"id": "s_1"}));
        let analytics = client(transport.clone(), dir.path());

        let body = json!({"name": "renamed"});
        analytics.update_segment("s_1", &body, Params::new()).unwrap();

        let call = last_call(&transport);
        assert_eq!(call.method, HttpMethod::Put);
        assert_eq!(call.body, crate::transport::RequestBody::Json(body));
        assert_eq!(call.query, vec![("locale".to_string(), "en_US".to_string())]);
    }

    #[test]
    fn test_dimension_and_metric_endpoints_take_rsid() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Get, "/dimensions", 200, json!([]));
        transport.respond(HttpMethod::Get, "/metrics/pageviews", 200, json!({}));
        let analytics = client(transport.clone(), dir.path());

        analytics.get_dimensions("suite1", Params::new()).unwrap();
        let call = last_call(&transport);
        assert_eq!(call.query[0], ("rsid".to_string(), "suite1".to_string()));
        assert!(call.query.contains(&("classifiable".to_string(), "false".to_string())));

        analytics.get_metric("pageviews", "suite1", Params::new()).unwrap();
        let call = last_call(&transport);
        assert!(call.url.ends_with("/metrics/pageviews"));
        assert_eq!(call.query[0], ("rsid".to_string(), "suite1".to_string()));
    }

    #[test]
    fn test_delete_with_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Delete, "/calculatedmetrics/cm_1", 200, Value::Null);
        let analytics = client(transport.clone(), dir.path());

        let body = analytics.delete_calculated_metric("cm_1", Params::new()).unwrap();
        assert_eq!(body, Value::Null);
    }

    #[test]
    fn test_users_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Get, "/users/me", 200, json!({"login": "me"}));
        transport.respond(HttpMethod::Get, "/users", 200, json!({"content": []}));
        let analytics = client(transport.clone(), dir.path());

        assert_eq!(analytics.get_current_user().unwrap()["login"], "me");
        assert!(last_call(&transport).query.is_empty());

        analytics.get_users(Params::new()).unwrap();
        let call = last_call(&transport);
        assert_eq!(call.query, vec![
            ("limit".to_string(), "0".to_string()),
            ("page".to_string(), "0".to_string()),
        ]);
    }

    #[test]
    fn test_reports_accepts_any_2xx_and_raises_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Post, "/reports", 202, json!({"lastPage": true}));
        transport.respond(
            HttpMethod::Post,
            "/reports",
            400,
            json!({"errorId": "e1", "errorCode": "invalid_rsid", "errorDescription": "unknown suite"}),
        );
        let analytics = client(transport, dir.path());

        let query = json!({"rsid": "suite1"});
        assert_eq!(analytics.reports(&query).unwrap()["lastPage"], true);
        match analytics.reports(&query) {
            Err(AnalyticsError::Report { status, error_code, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(error_code, "invalid_rsid");
            }
            other => panic!("expected Report error, got {:?}", other),
        }
    }

    #[test]
    fn test_reports_retry_network_errors() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.fail(HttpMethod::Post, "/reports", "timed out");
        transport.respond(HttpMethod::Post, "/reports", 200, json!({"lastPage": true}));
        let analytics = client(transport.clone(), dir.path());

        analytics.reports(&json!({})).unwrap();
        assert_eq!(transport.count("/reports"), 2);
    }

    #[test]
    fn test_reports_do_not_repeat_failed_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.fail(HttpMethod::Post, "/ims/exchange/jwt", "connection reset");
        let config = ClientConfig::default().with_retry(RetryPolicy {
            initial_delay: std::time::Duration::from_millis(1),
            ..RetryPolicy::default()
        });
        let max_retries = config.retry.max_retries as usize;
        let analytics = Analytics::with_session(TokenSession::with_transport(
            testing::credentials(dir.path()),
            config,
            transport.clone(),
            Arc::new(SystemClock),
        ));

        let result = analytics.reports(&json!({}));
        assert!(matches!(result, Err(AnalyticsError::Network(_))));
        assert_eq!(transport.count("/ims/exchange/jwt"), max_retries + 1);
        assert_eq!(transport.count("/reports"), 0);
    }
}
