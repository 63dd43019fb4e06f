//! XLSX constants and default preset factories.

use opslog_merge::C_FIELD_DATE;

use crate::spec::{EnumCellAlign, SpecCellStyle, SpecXlsxStylePresets};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Banner rows above the header row in every log sheet.
pub const N_ROWS_HEADER_SKIP: usize = 5;

/// Default export sheet name.
pub const C_SHEET_NAME_EXPORT: &str = "Ops Log";

/// Export column set: `(dataset column, display header)`, in output order.
pub const TUP_EXPORT_COLUMNS: [(&str, &str); 14] = [
    (C_FIELD_DATE, "Date"),
    ("Incident", "Incident"),
    ("District", "District"),
    ("Maintenance Event", "Maintenance"),
    ("Incident Event", "Incident Event"),
    ("Business Impact", "Business Impact"),
    ("RCA", "Root Cause"),
    ("Duration (hrs)", "Est. Duration (h)"),
    ("Start (hrs)", "Start (h)"),
    ("End (hrs)", "End (h)"),
    ("Real Time (hrs)", "Actual Duration (h)"),
    ("Ticket #", "Ticket"),
    ("Assigned", "Assigned To"),
    ("Notes", "Notes"),
];

/// Dataset columns written as numbers (blank when empty).
pub const TUP_EXPORT_DURATION_COLUMNS: [&str; 4] = [
    "Duration (hrs)",
    "Start (hrs)",
    "End (hrs)",
    "Real Time (hrs)",
];

/// Body font.
pub const C_FONT_NAME_DEFAULT: &str = "Calibri";
/// Body font size in points.
pub const N_FONT_SIZE_DEFAULT: f64 = 11.0;
/// Header fill (light blue).
pub const N_RGB_HEADER_FILL: u32 = 0xD9E1F2;
/// Hour columns show two decimals.
pub const C_NUM_FORMAT_HOURS: &str = "0.00";

/// Default style presets used by [`crate::writer::XlsxWriter`].
pub fn derive_default_xlsx_styles() -> SpecXlsxStylePresets {
    let style_text = SpecCellStyle::default();
    SpecXlsxStylePresets {
        header: SpecCellStyle {
            if_bold: true,
            align: EnumCellAlign::Center,
            fill_rgb: Some(N_RGB_HEADER_FILL),
            ..style_text.clone()
        },
        hours: SpecCellStyle {
            align: EnumCellAlign::Right,
            num_format: Some(C_NUM_FORMAT_HOURS.to_string()),
            ..style_text.clone()
        },
        text: style_text,
    }
}
