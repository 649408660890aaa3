use crate::analytics::Analytics;
use crate::client::ClientConfig;
use crate::credentials::Credentials;
use crate::error::{AnalyticsError, Result};
use crate::table::{Frame, Table, TableHistory};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Report query payload in the API's own JSON schema.
///
/// Only two parts are interpreted: `settings.page`, the pagination cursor,
/// and `metricContainer.metrics[].id`, the output columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery(Value);

impl ReportQuery {
    /// Wrap a JSON object
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_object() {
            Ok(ReportQuery(value))
        } else {
            Err(AnalyticsError::InvalidQuery("query must be a JSON object".to_string()))
        }
    }

    /// JSON payload as sent to the reports endpoint
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Current page cursor, 0 when unset
    pub fn page(&self) -> u64 {
        self.0
            .pointer("/settings/page")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Increment `settings.page` by one, starting from 0 when absent
    pub fn advance_page(&mut self) -> Result<()> {
        let map = self
            .0
            .as_object_mut()
            .ok_or_else(|| AnalyticsError::InvalidQuery("query must be a JSON object".to_string()))?;
        let settings = map
            .entry("settings")
            .or_insert_with(|| Value::Object(Map::new()));
        let settings = settings
            .as_object_mut()
            .ok_or_else(|| AnalyticsError::InvalidQuery("settings must be an object".to_string()))?;

        let page = match settings.get("page") {
            None => 0,
            Some(page) => page
                .as_u64()
                .ok_or_else(|| AnalyticsError::InvalidQuery(format!("invalid page {}", page)))?,
        };
        settings.insert("page".to_string(), Value::from(page + 1));
        Ok(())
    }

    /// Metric ids in query order, duplicates kept
    pub fn metric_ids(&self) -> Result<Vec<String>> {
        let metrics = self
            .0
            .pointer("/metricContainer/metrics")
            .and_then(Value::as_array)
            .ok_or_else(|| AnalyticsError::InvalidQuery("missing metricContainer.metrics".to_string()))?;

        metrics
            .iter()
            .map(|metric| {
                metric
                    .get("id")
                    .and_then(Value::as_str)
                    .map(|id| id.to_string())
                    .ok_or_else(|| AnalyticsError::InvalidQuery(format!("metric without id: {}", metric)))
            })
            .collect()
    }
}

impl FromStr for ReportQuery {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

/// One page of a report response.
///
/// Breakdown responses carry `rows` and a dimension, summary-only responses
/// have no `rows` and only `summaryData`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportChunk {
    /// Set on the final page
    pub last_page: bool,
    #[serde(default)]
    pub first_page: Option<bool>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub number_of_elements: Option<u64>,
    #[serde(default)]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub columns: ChunkColumns,
    #[serde(default)]
    pub rows: Option<Vec<ReportRow>>,
    #[serde(default)]
    pub summary_data: SummaryData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkColumns {
    #[serde(default)]
    pub dimension: Option<ChunkDimension>,
    #[serde(default)]
    pub column_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkDimension {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// A dimension item and its metric values
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub item_id: Option<String>,
    pub value: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    #[serde(default)]
    pub totals: Vec<f64>,
    #[serde(default)]
    pub filtered_totals: Vec<f64>,
    /// Statistics such as `col-max` and `col-min`
    #[serde(flatten)]
    pub statistics: BTreeMap<String, Value>,
}

/// Something that can run one page of a report query
pub trait ReportSource {
    fn fetch_report(&self, query: &ReportQuery) -> Result<ReportChunk>;
}

impl ReportSource for Analytics {
    fn fetch_report(&self, query: &ReportQuery) -> Result<ReportChunk> {
        let body = self.reports(query.as_value())?;
        Ok(serde_json::from_value(body)?)
    }
}

/// Position of a [`Pages`] iterator in the pagination protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    AwaitingFirstPage,
    AwaitingNextPage,
    Done,
    Failed,
}

/// Lazy iterator over report pages.
///
/// Each step requests the current page, advances the query's page cursor for
/// the next step, and yields the chunk. Iteration ends after the chunk with
/// `lastPage` set, or after the first error.
pub struct Pages<'a, S: ReportSource + ?Sized> {
    source: &'a S,
    query: &'a mut ReportQuery,
    state: PageState,
}

impl<'a, S: ReportSource + ?Sized> Pages<'a, S> {
    pub fn new(source: &'a S, query: &'a mut ReportQuery) -> Self {
        Pages {
            source,
            query,
            state: PageState::AwaitingFirstPage,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }
}

impl<'a, S: ReportSource + ?Sized> Iterator for Pages<'a, S> {
    type Item = Result<ReportChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, PageState::Done | PageState::Failed) {
            return None;
        }

        let page = self.query.page();
        let result = self
            .source
            .fetch_report(self.query)
            .and_then(|chunk| self.query.advance_page().map(|_| chunk));

        match result {
            Ok(chunk) => {
                debug!(page, last_page = chunk.last_page, "fetched report page");
                self.state = if chunk.last_page {
                    PageState::Done
                } else {
                    PageState::AwaitingNextPage
                };
                Some(Ok(chunk))
            }
            Err(e) => {
                self.state = PageState::Failed;
                Some(Err(e))
            }
        }
    }
}

impl<'a, S: ReportSource + ?Sized> FusedIterator for Pages<'a, S> {}

/// Drives the paginated reports endpoint and assembles tables
pub struct Reports<S = Analytics> {
    source: S,
    history: Mutex<TableHistory>,
    next_id: AtomicU64,
}

impl Reports<Analytics> {
    /// Create an aggregator backed by the Analytics API
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let capacity = config.history_capacity;
        Ok(Self::with_source(Analytics::new(credentials, config)?, capacity))
    }

    /// Create an aggregator from a credentials file with the default configuration
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Credentials::from_path(path)?, ClientConfig::default())
    }
}

impl<S: ReportSource> Reports<S> {
    /// Create an aggregator over any report source
    pub fn with_source(source: S, history_capacity: usize) -> Self {
        Reports {
            source,
            history: Mutex::new(TableHistory::new(history_capacity)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Lazily request pages until the last one
    pub fn fetch_pages<'a>(&'a self, query: &'a mut ReportQuery) -> Pages<'a, S> {
        Pages::new(&self.source, query)
    }

    /// Build a table from the query's report.
    ///
    /// With `fetch_all` every page is requested; otherwise only the first.
    /// The table is also recorded in the history.
    pub fn build_table(&self, query: &mut ReportQuery, fetch_all: bool) -> Result<Arc<Table>> {
        let columns = query.metric_ids()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut table = Table::new(id, columns);

        for chunk in self.fetch_pages(query) {
            table.absorb(&chunk?);
            if !fetch_all {
                break;
            }
        }

        info!(
            id,
            rows = table.rows().len(),
            dimension = table.dimension().unwrap_or("-"),
            "report table built"
        );
        let table = Arc::new(table);
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(table.clone());
        Ok(table)
    }

    /// Build a table and project it into a frame
    pub fn to_tabular(&self, query: &mut ReportQuery, fetch_all: bool) -> Result<Frame> {
        self.build_table(query, fetch_all)?.to_frame()
    }

    /// Recently built tables, oldest first
    pub fn history(&self) -> Vec<Arc<Table>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).tables()
    }

    /// Forget all recorded tables
    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
