//! Shared pipeline models, options and top-level error types.

use std::fmt;

use chrono::{Months, NaiveDate};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::conf::{C_FIELD_DATE, N_COLS_UNION_MAX, N_DAYS_WINDOW_MAX};
use crate::util::parse_date_text;

////////////////////////////////////////////////////////////////////////////////
// #region CellValues

/// Scalar cell value of a raw row.
///
/// `Empty` is the sentinel for "absent": a missing cell and a blank cell are
/// the same thing once a row leaves the reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Missing/blank value.
    #[default]
    Empty,
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(f64),
}

impl CellValue {
    /// True for `Empty` and for empty text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Rows

/// One spreadsheet (or note-derived) row keyed by sheet-defined column names.
///
/// Keys are unique and keep insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty row with room for `capacity` cells.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Wrap cells whose keys the caller already knows to be unique.
    pub(crate) fn from_unique_cells(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    /// Insert or replace one cell; returns the replaced value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<CellValue>,
    ) -> Option<CellValue> {
        let key = key.into();
        let value = value.into();
        if let Some((_, slot)) = self.cells.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        self.cells.push((key, value));
        None
    }

    /// Insert a cell at the front, replacing any existing cell with that key.
    pub fn insert_first(&mut self, key: impl Into<String>, value: impl Into<CellValue>) {
        let key = key.into();
        self.remove(&key);
        self.cells.insert(0, (key, value.into()));
    }

    /// Look up one cell.
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether a cell with `key` exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.cells.iter().any(|(k, _)| k == key)
    }

    /// Remove one cell, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<CellValue> {
        let n_idx = self.cells.iter().position(|(k, _)| k == key)?;
        Some(self.cells.remove(n_idx).1)
    }

    /// Keep only cells matching `predicate`.
    pub fn retain(&mut self, mut predicate: impl FnMut(&str, &CellValue) -> bool) {
        self.cells.retain(|(k, v)| predicate(k, v));
    }

    /// Column names in row order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    /// `(column, value)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether every cell is empty.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_empty())
    }
}

impl IntoIterator for RawRow {
    type Item = (String, CellValue);
    type IntoIter = std::vec::IntoIter<(String, CellValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl<K, V> FromIterator<(K, V)> for RawRow
where
    K: Into<String>,
    V: Into<CellValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (key, value) in iter {
            row.insert(key, value);
        }
        row
    }
}

/// Rows of one sheet as delivered by the workbook reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetRows {
    /// Sheet name/identity.
    pub sheet_name: String,
    /// Header names in positional order.
    pub columns: Vec<String>,
    /// Data rows (after the skipped header rows).
    pub rows: Vec<RawRow>,
}

/// Canonical output row: every column of the dataset schema, as text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedRow {
    cells: Vec<(String, String)>,
}

impl NormalizedRow {
    pub(crate) fn from_cells(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    /// Look up one value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Canonical `YYYY-MM-DD` date, or `""` when unresolvable.
    pub fn date(&self) -> &str {
        self.get(C_FIELD_DATE).unwrap_or("")
    }

    /// Column names in schema order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for NormalizedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (key, value) in &self.cells {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Rectangular, chronologically ordered pipeline output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalDataset {
    columns: Vec<String>,
    rows: Vec<NormalizedRow>,
}

impl CanonicalDataset {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<NormalizedRow>) -> Self {
        Self { columns, rows }
    }

    /// Schema shared by every row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in canonical order.
    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order; `""` for every row when the
    /// column is not part of the schema.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows.iter().map(move |row| row.get(column).unwrap_or(""))
    }

    /// Consume into rows.
    pub fn into_rows(self) -> Vec<NormalizedRow> {
        self.rows
    }
}

impl Serialize for CanonicalDataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AdminNotes

/// Administrator-authored log entry, optionally recurring weekly.
///
/// Field decoding is permissive: text fields accept numbers and `null`,
/// duration fields accept numbers, numeric strings, `""` and `null`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AdminNote {
    /// Storage id.
    pub id: Option<i64>,
    #[serde(deserialize_with = "deserialize_text")]
    pub incident: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub district: String,
    /// Concrete date for one-off notes.
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub date: Option<NaiveDate>,
    /// English day name for weekly notes.
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub weekday: Option<String>,
    #[serde(deserialize_with = "deserialize_text")]
    pub maint_event: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub incident_event: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub business_impact: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub rca: String,
    #[serde(deserialize_with = "deserialize_optional_hours")]
    pub est_duration_hrs: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_hours")]
    pub start_duration_hrs: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_hours")]
    pub end_duration_hrs: Option<f64>,
    #[serde(deserialize_with = "deserialize_optional_hours")]
    pub real_time_duration_hrs: Option<f64>,
    #[serde(deserialize_with = "deserialize_text")]
    pub ticket_number: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub assigned: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub note: String,
}

impl AdminNote {
    /// Non-blank recurrence tag, trimmed.
    pub fn weekday_tag(&self) -> Option<&str> {
        self.weekday
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }

    /// Value of one note field by its storage name; unknown names are `Empty`.
    pub fn field_value(&self, field: &str) -> CellValue {
        let text = match field {
            "incident" => &self.incident,
            "district" => &self.district,
            "maint_event" => &self.maint_event,
            "incident_event" => &self.incident_event,
            "business_impact" => &self.business_impact,
            "rca" => &self.rca,
            "ticket_number" => &self.ticket_number,
            "assigned" => &self.assigned,
            "note" => &self.note,
            "est_duration_hrs" => return self.est_duration_hrs.into(),
            "start_duration_hrs" => return self.start_duration_hrs.into(),
            "end_duration_hrs" => return self.end_duration_hrs.into(),
            "real_time_duration_hrs" => return self.real_time_duration_hrs.into(),
            _ => return CellValue::Empty,
        };
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.clone())
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl LooseScalar {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Integer(n) => n.to_string(),
            Self::Float(n) => CellValue::Number(n).to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }
}

fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<LooseScalar>::deserialize(deserializer)?
        .map(LooseScalar::into_text)
        .unwrap_or_default())
}

fn deserialize_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<LooseScalar>::deserialize(deserializer)?
        .map(LooseScalar::into_text)
        .filter(|s| !s.trim().is_empty()))
}

fn deserialize_optional_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let Some(text) = deserialize_optional_text(deserializer)? else {
        return Ok(None);
    };
    parse_date_text(&text)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid note date: {text:?}")))
}

fn deserialize_optional_hours<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    match Option::<LooseScalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LooseScalar::Integer(n)) => Ok(Some(n as f64)),
        Some(LooseScalar::Float(n)) => Ok(Some(n)),
        Some(LooseScalar::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid duration hours: {s:?}")))
        }
        Some(LooseScalar::Boolean(b)) => Err(serde::de::Error::custom(format!(
            "invalid duration hours: {b}"
        ))),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecurrenceWindow

/// Inclusive calendar range over which weekly notes are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecurrenceWindow {
    /// First day (inclusive).
    pub date_min: NaiveDate,
    /// Last day (inclusive).
    pub date_max: NaiveDate,
}

impl RecurrenceWindow {
    /// Window over `[date_min, date_max]`; an inverted range is allowed and empty.
    pub fn new(date_min: NaiveDate, date_max: NaiveDate) -> Self {
        Self { date_min, date_max }
    }

    /// Window of `n_months` before and after `anchor`.
    pub fn around(anchor: NaiveDate, n_months: u32) -> Self {
        let months = Months::new(n_months);
        Self {
            date_min: anchor.checked_sub_months(months).unwrap_or(NaiveDate::MIN),
            date_max: anchor.checked_add_months(months).unwrap_or(NaiveDate::MAX),
        }
    }

    /// Whether the window contains no day at all.
    pub fn is_empty(&self) -> bool {
        self.date_min > self.date_max
    }

    /// Number of calendar days covered.
    pub fn n_days(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.date_max - self.date_min).num_days() as usize + 1
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_min <= date && date <= self.date_max
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Pipeline options; every field has a default so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecPipelineOptions {
    /// Reject recurrence windows longer than this many days.
    pub n_days_window_max: Option<usize>,
    /// Reject schema unions wider than this many columns.
    pub n_cols_union_max: usize,
    /// Re-check rectangularity and order before returning.
    pub if_validate_output: bool,
}

impl Default for SpecPipelineOptions {
    fn default() -> Self {
        Self {
            n_days_window_max: Some(N_DAYS_WINDOW_MAX),
            n_cols_union_max: N_COLS_UNION_MAX,
            if_validate_output: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Pipeline stage that can abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumPipelineStage {
    /// Workbook content could not be read.
    Parse,
    /// Recurrence expansion could not run.
    Expand,
    /// Schema union could not be built.
    Reconcile,
    /// Dates/order could not be established.
    Normalize,
}

impl fmt::Display for EnumPipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Expand => "expand",
            Self::Reconcile => "reconcile",
            Self::Normalize => "normalize",
        };
        write!(f, "{name}")
    }
}

/// Terminal failure of one pipeline run. No partial dataset accompanies it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("expand failed: {0}")]
    Expand(String),
    #[error("reconcile failed: {0}")]
    Reconcile(String),
    #[error("normalize failed: {0}")]
    Normalize(String),
    #[error("a pipeline run is already in flight")]
    RunInFlight,
    #[error("pipeline worker stopped before replying")]
    WorkerStopped,
    #[error("pipeline run panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Stage that failed, when the failure belongs to one.
    pub fn stage(&self) -> Option<EnumPipelineStage> {
        match self {
            Self::Parse(_) => Some(EnumPipelineStage::Parse),
            Self::Expand(_) => Some(EnumPipelineStage::Expand),
            Self::Reconcile(_) => Some(EnumPipelineStage::Reconcile),
            Self::Normalize(_) => Some(EnumPipelineStage::Normalize),
            Self::RunInFlight | Self::WorkerStopped | Self::Panicked(_) => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
