use crate::error::{AnalyticsError, Result};
use crate::reports::ReportChunk;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// Label of the single row produced by a summary-only chunk
pub const TOTAL_LABEL: &str = "Total";

/// One labeled row of metric values
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Dimension item value, or [`TOTAL_LABEL`]
    pub label: String,
    /// Metric values, positionally aligned with the table columns
    pub values: Vec<f64>,
}

/// Report result accumulated over all fetched chunks.
///
/// Columns come from the query's metrics, rows are appended chunk by chunk
/// without de-duplication. A table is immutable once handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    id: u64,
    columns: Vec<String>,
    rows: Vec<TableRow>,
    dimension: Option<String>,
}

impl Table {
    pub(crate) fn new(id: u64, columns: Vec<String>) -> Self {
        Table {
            id,
            columns,
            rows: Vec::new(),
            dimension: None,
        }
    }

    /// Merge one report chunk into the table.
    ///
    /// A breakdown chunk appends all of its rows and records its dimension.
    /// A summary-only chunk appends a single [`TOTAL_LABEL`] row with the totals.
    pub(crate) fn absorb(&mut self, chunk: &ReportChunk) {
        match &chunk.rows {
            Some(rows) => {
                self.rows.extend(rows.iter().map(|row| TableRow {
                    label: row.value.clone(),
                    values: row.data.clone(),
                }));
                if let Some(dimension) = &chunk.columns.dimension {
                    if let Some(previous) = self.dimension.as_deref() {
                        if previous != dimension.id {
                            warn!(previous, current = %dimension.id, "dimension changed between report pages");
                        }
                    }
                    self.dimension = Some(dimension.id.clone());
                }
            }
            None => self.rows.push(TableRow {
                label: TOTAL_LABEL.to_string(),
                values: chunk.summary_data.totals.clone(),
            }),
        }
    }

    /// Sequence number of the table within its aggregator, starting at 1
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Metric column identifiers, in query order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Breakdown dimension, absent for summary-only results
    pub fn dimension(&self) -> Option<&str> {
        self.dimension.as_deref()
    }

    /// Project into a columns x rows frame
    pub fn to_frame(&self) -> Result<Frame> {
        Frame::new(
            self.rows.iter().map(|r| r.label.clone()).collect(),
            self.columns.clone(),
            self.rows.iter().map(|r| r.values.clone()).collect(),
        )
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Table {:?}>", self.columns)
    }
}

/// Row-major matrix indexed by row label and column identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: Vec<String>,
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl Frame {
    /// Build a frame, every row must have one value per column
    pub fn new(index: Vec<String>, columns: Vec<String>, data: Vec<Vec<f64>>) -> Result<Self> {
        if index.len() != data.len() {
            return Err(AnalyticsError::ShapeMismatch {
                row: "<index>".to_string(),
                expected: data.len(),
                found: index.len(),
            });
        }
        if let Some((label, row)) = index.iter().zip(&data).find(|(_, row)| row.len() != columns.len()) {
            return Err(AnalyticsError::ShapeMismatch {
                row: label.clone(),
                expected: columns.len(),
                found: row.len(),
            });
        }
        Ok(Frame { index, columns, data })
    }

    /// Row labels
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Column identifiers
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    /// Values of the first row with `label`
    pub fn row(&self, label: &str) -> Option<&[f64]> {
        self.index
            .iter()
            .position(|l| l == label)
            .map(|i| self.data[i].as_slice())
    }

    /// Values of the first column with `id`, top to bottom
    pub fn column(&self, id: &str) -> Option<Vec<f64>> {
        let col = self.columns.iter().position(|c| c == id)?;
        Some(self.data.iter().map(|row| row[col]).collect())
    }

    /// Single cell
    pub fn get(&self, label: &str, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.row(label).map(|row| row[col])
    }
}

/// Most recently built tables, oldest evicted first
#[derive(Debug, Clone)]
pub struct TableHistory {
    capacity: usize,
    tables: VecDeque<Arc<Table>>,
}

impl TableHistory {
    pub fn new(capacity: usize) -> Self {
        TableHistory {
            capacity,
            tables: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, table: Arc<Table>) {
        if self.capacity == 0 {
            return;
        }
        while self.tables.len() >= self.capacity {
            self.tables.pop_front();
        }
        self.tables.push_back(table);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables from oldest to newest
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.tables.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Arc<Table>> {
        self.tables.back().cloned()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
