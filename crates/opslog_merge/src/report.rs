//! Run report model and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportPipeline {
    /// Number of sheets merged.
    pub cnt_sheets: u64,
    /// Rows contributed by sheets.
    pub cnt_rows_sheet: u64,
    /// Admin notes received.
    pub cnt_notes: u64,
    /// Admin notes carrying a recognized weekday tag.
    pub cnt_notes_recurring: u64,
    /// Rows produced by recurrence expansion.
    pub cnt_rows_expanded: u64,
    /// Rows in the canonical dataset.
    pub cnt_rows_total: u64,
    /// Columns in the canonical schema.
    pub cnt_cols: u64,
    /// Rows without a resolvable date.
    pub cnt_rows_undated: u64,
    /// Absorbed, non-fatal conditions.
    pub warnings: Vec<String>,
}

impl ReportPipeline {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_sheets".to_string(), self.cnt_sheets);
        dict_counts.insert("cnt_rows_sheet".to_string(), self.cnt_rows_sheet);
        dict_counts.insert("cnt_notes".to_string(), self.cnt_notes);
        dict_counts.insert("cnt_notes_recurring".to_string(), self.cnt_notes_recurring);
        dict_counts.insert("cnt_rows_expanded".to_string(), self.cnt_rows_expanded);
        dict_counts.insert("cnt_rows_total".to_string(), self.cnt_rows_total);
        dict_counts.insert("cnt_cols".to_string(), self.cnt_cols);
        dict_counts.insert("cnt_rows_undated".to_string(), self.cnt_rows_undated);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} sheets={} sheet_rows={} notes={} recurring={} expanded={} rows={} cols={} undated={} warnings={}",
            self.cnt_sheets,
            self.cnt_rows_sheet,
            self.cnt_notes,
            self.cnt_notes_recurring,
            self.cnt_rows_expanded,
            self.cnt_rows_total,
            self.cnt_cols,
            self.cnt_rows_undated,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MERGE]"))
    }
}

/// Mutable accumulator for run statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportPipelineBuilder {
    report: ReportPipeline,
}

impl ReportPipelineBuilder {
    /// Record one merged sheet and its row count.
    pub fn add_sheet(&mut self, n_rows: usize) {
        self.report.cnt_sheets += 1;
        self.report.cnt_rows_sheet += n_rows as u64;
    }

    /// Record one received note.
    pub fn add_note(&mut self) {
        self.report.cnt_notes += 1;
    }

    /// Record one recurring note and its occurrence count.
    pub fn add_recurring_note(&mut self, n_occurrences: usize) {
        self.report.cnt_notes_recurring += 1;
        self.report.cnt_rows_expanded += n_occurrences as u64;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!(target: "opslog_merge", "{warning}");
        self.report.warnings.push(warning);
    }

    /// Finalize builder with dataset shape.
    pub fn build(mut self, n_rows_total: usize, n_cols: usize, n_rows_undated: usize) -> ReportPipeline {
        self.report.cnt_rows_total = n_rows_total as u64;
        self.report.cnt_cols = n_cols as u64;
        self.report.cnt_rows_undated = n_rows_undated as u64;
        self.report
    }
}
