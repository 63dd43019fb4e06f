//! `opslog_merge` v1:
//! Rust-side ops log unification kernel.
//!
//! Sheets of an incident/maintenance workbook plus admin notes become one
//! rectangular, chronologically ordered dataset.
//!
//! Architecture:
//! - `conf`       : constants and default presets
//! - `spec`       : rows/notes/options/errors
//! - `util`       : date parsing helpers
//! - `report`     : run-time report model
//! - `sanitize`   : per-sheet column cleaning
//! - `recurrence` : weekly note expansion
//! - `reconcile`  : schema union and fill
//! - `normalize`  : date canonicalization and sort
//! - `pipeline`   : single-run orchestration
//! - `worker`     : request/response background runner
pub mod conf;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod recurrence;
pub mod report;
pub mod sanitize;
pub mod spec;
pub mod util;
pub mod worker;

pub use conf::{
    C_FIELD_DATE, C_PREFIX_PLACEHOLDER_COLUMN, N_COLS_UNION_MAX, N_DAYS_WINDOW_MAX,
    N_MONTHS_WINDOW_DEFAULT, TUP_NOTE_FIELD_MAP, derive_default_pipeline_options,
};
pub use normalize::{normalize, resolve_row_date, validate_dataset};
pub use pipeline::{SpecPipelineInput, SpecPipelineOutput, build_canonical_dataset};
pub use reconcile::{derive_column_union, reconcile};
pub use recurrence::{derive_note_row, expand, parse_weekday_tag};
pub use report::{ReportPipeline, ReportPipelineBuilder};
pub use sanitize::{ColumnSanitizer, SanitizerDefault};
pub use spec::{
    AdminNote, CanonicalDataset, CellValue, EnumPipelineStage, NormalizedRow, PipelineError,
    RawRow, RecurrenceWindow, SheetRows, SpecPipelineOptions,
};
pub use worker::{PipelineTicket, PipelineWorker, SpecPipelineRequest, WorkbookParser};
