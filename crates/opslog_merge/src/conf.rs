//! Pipeline constants and default preset factories.

use chrono::Weekday;

use crate::spec::SpecPipelineOptions;

/// Canonical date field name shared by sheet rows and note rows.
pub const C_FIELD_DATE: &str = "Date";
/// Header name the reader assigns to blank header cells (`__EMPTY`, `__EMPTY_1`, ...).
pub const C_PREFIX_PLACEHOLDER_COLUMN: &str = "__EMPTY";
/// Half-width of the live-view recurrence window in months.
pub const N_MONTHS_WINDOW_DEFAULT: u32 = 1;
/// Largest number of calendar days a recurrence window may span.
pub const N_DAYS_WINDOW_MAX: usize = 3_660;
/// Largest schema union width (Excel worksheet column limit).
pub const N_COLS_UNION_MAX: usize = 16_384;
/// Excel serial number of 9999-12-31.
pub const N_EXCEL_SERIAL_MAX: f64 = 2_958_465.0;

/// Recurrence tags, Sunday=0 ... Saturday=6.
pub const TUP_WEEKDAY_NAMES: [(&str, Weekday); 7] = [
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
];

/// Fixed mapping from admin-note fields to the sheet field vocabulary.
///
/// Order here is the column order of every note-derived row (after `Date`).
pub const TUP_NOTE_FIELD_MAP: [(&str, &str); 13] = [
    ("incident", "Incident"),
    ("district", "District"),
    ("maint_event", "Maintenance Event"),
    ("incident_event", "Incident Event"),
    ("business_impact", "Business Impact"),
    ("rca", "RCA"),
    ("est_duration_hrs", "Duration (hrs)"),
    ("start_duration_hrs", "Start (hrs)"),
    ("end_duration_hrs", "End (hrs)"),
    ("real_time_duration_hrs", "Real Time (hrs)"),
    ("ticket_number", "Ticket #"),
    ("assigned", "Assigned"),
    ("note", "Notes"),
];

/// Build default pipeline options.
pub fn derive_default_pipeline_options() -> SpecPipelineOptions {
    SpecPipelineOptions::default()
}
