//! # marketingcloud - Adobe Analytics 2.0 API client for Rust
//!
//! A blocking client for the Adobe Analytics REST API. It authenticates with
//! the JWT service-account flow, keeps the bearer token fresh, and turns the
//! paginated reports endpoint into plain tables.
//!
//! ## Features
//!
//! - JWT service-account authentication:
//!   - RS256 assertions minted from the account's private key
//!   - Bearer token cached until expiry and refreshed before the next call
//! - Thin wrappers over the calculated metrics, segments, date ranges,
//!   dimensions, metrics, collections and users endpoints
//! - Report pagination merged into a [`Table`] and projected into a [`Frame`]
//! - Typed errors carrying the server's diagnostics
//!
//! ## Credentials
//!
//! The credentials file is the JSON object of a service-account integration:
//!
//! ```json
//! {
//!     "iss": "XXXXXX@AdobeOrg",
//!     "sub": "XXXXX@techacct.adobe.com",
//!     "aud": "https://ims-na1.adobelogin.com/c/XXXXXX",
//!     "https://ims-na1.adobelogin.com/s/ent_analytics_bulk_ingest_sdk": true,
//!     "privateKeyPath": "/path/on/your/system",
//!     "clientSecret": "XXXXXXX",
//!     "companyId": "XXXXX"
//! }
//! ```
//!
//! ## Basic Usage
//!
//! ```no_run
//! use marketingcloud::{Analytics, Params};
//!
//! fn main() -> Result<(), marketingcloud::AnalyticsError> {
//!     let analytics = Analytics::from_path("credentials.json")?;
//!
//!     let segments = analytics.get_segments(Params::new().set("limit", 50))?;
//!     println!("{}", segments);
//!     Ok(())
//! }
//! ```
//!
//! ## Reports
//!
//! ```no_run
//! use marketingcloud::{ReportQuery, Reports};
//!
//! let reports = Reports::from_path("credentials.json")?;
//! let mut query: ReportQuery = r#"{
//!     "rsid": "myreportsuite",
//!     "globalFilters": [{
//!         "type": "dateRange",
//!         "dateRange": "2019-11-01T00:00:00.000/2019-12-01T00:00:00.000"
//!     }],
//!     "metricContainer": {"metrics": [{"columnId": "0", "id": "metrics/visits"}]},
//!     "dimension": "variables/daterangeday",
//!     "settings": {"limit": 10, "page": 0}
//! }"#.parse()?;
//!
//! let frame = reports.to_tabular(&mut query, true)?;
//! for (label, row) in frame.index().iter().zip(frame.data()) {
//!     println!("{}: {:?}", label, row);
//! }
//! # Ok::<(), marketingcloud::AnalyticsError>(())
//! ```

pub mod analytics;
pub mod client;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod reports;
pub mod session;
pub mod table;
pub mod time;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use analytics::{Analytics, Params};
pub use client::{ClientConfig, RetryPolicy};
pub use credentials::Credentials;
pub use error::{AnalyticsError, Result};
pub use reports::{PageState, Pages, ReportChunk, ReportQuery, ReportSource, Reports};
pub use session::{RequestOptions, TokenSession};
pub use table::{Frame, Table, TableHistory, TableRow};
pub use time::{Clock, FixedClock, SystemClock};
pub use token::{BearerToken, TokenResponse};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};

// Re-export serde_json for convenience
pub use serde_json::json;
