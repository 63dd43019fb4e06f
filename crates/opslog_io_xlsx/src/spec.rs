//! Models, options and errors shared by the reader, writer and export.

use std::ops::Range;

use thiserror::Error;

use crate::conf::{
    C_FONT_NAME_DEFAULT, C_SHEET_NAME_EXPORT, N_FONT_SIZE_DEFAULT, N_ROWS_HEADER_SKIP,
    derive_default_xlsx_styles,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellStyles

/// Horizontal cell alignment. Cells are always vertically centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCellAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Visual style of one class of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCellStyle {
    pub font_name: String,
    pub font_size: f64,
    pub if_bold: bool,
    pub align: EnumCellAlign,
    /// Thin border on all sides.
    pub if_border: bool,
    /// Excel number format code, numeric cells only.
    pub num_format: Option<String>,
    /// Background fill as `0xRRGGBB`.
    pub fill_rgb: Option<u32>,
}

impl Default for SpecCellStyle {
    fn default() -> Self {
        Self {
            font_name: C_FONT_NAME_DEFAULT.to_string(),
            font_size: N_FONT_SIZE_DEFAULT,
            if_bold: false,
            align: EnumCellAlign::Left,
            if_border: true,
            num_format: None,
            fill_rgb: None,
        }
    }
}

/// Styles the writer picks from: header row, text body, hour columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxStylePresets {
    pub header: SpecCellStyle,
    pub text: SpecCellStyle,
    pub hours: SpecCellStyle,
}

/// One cell as it will land in the worksheet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumXlsxCell {
    Blank,
    Text(String),
    Number(f64),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Which cells drive column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumColumnWidthRule {
    /// Leave Excel's default width.
    Fixed,
    Header,
    Body,
    #[default]
    HeaderAndBody,
}

/// Column width inference policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnWidthPolicy {
    pub rule: EnumColumnWidthRule,
    /// Body rows inspected per column; `None` inspects all of them.
    pub n_rows_sampled_max: Option<usize>,
    pub n_width_min: usize,
    pub n_width_max: usize,
    pub n_width_padding: usize,
}

impl Default for SpecColumnWidthPolicy {
    fn default() -> Self {
        Self {
            rule: EnumColumnWidthRule::HeaderAndBody,
            n_rows_sampled_max: Some(20_000),
            n_width_min: 8,
            n_width_max: 60,
            n_width_padding: 2,
        }
    }
}

impl SpecColumnWidthPolicy {
    /// Reject bounds that cannot produce a width.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_width_min == 0 {
            return Err("column width policy: n_width_min must be >= 1".to_string());
        }
        if self.n_width_max < self.n_width_min {
            return Err(format!(
                "column width policy: n_width_max ({}) < n_width_min ({})",
                self.n_width_max, self.n_width_min
            ));
        }
        Ok(())
    }

    /// Final width for a column whose widest header/body cells measure
    /// `n_header` and `n_body`; `None` under [`EnumColumnWidthRule::Fixed`].
    pub fn derive_width(&self, n_header: usize, n_body: usize) -> Option<usize> {
        let n_measured = match self.rule {
            EnumColumnWidthRule::Fixed => return None,
            EnumColumnWidthRule::Header => n_header,
            EnumColumnWidthRule::Body => n_body,
            EnumColumnWidthRule::HeaderAndBody => n_header.max(n_body),
        };
        let n_max = self.n_width_max.clamp(self.n_width_min, 255);
        Some((n_measured + self.n_width_padding).clamp(self.n_width_min, n_max))
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxWriteOptions {
    pub styles: SpecXlsxStylePresets,
    /// Treat columns with a numeric dtype as numeric without naming them.
    pub if_infer_numeric_cols: bool,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            styles: derive_default_xlsx_styles(),
            if_infer_numeric_cols: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReadOptions

/// Workbook reading options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxReadOptions {
    /// Rows skipped above the header row of every sheet.
    pub n_rows_skip: usize,
    /// Keep rows whose cells are all empty.
    pub if_keep_blank_rows: bool,
}

impl Default for SpecXlsxReadOptions {
    fn default() -> Self {
        Self {
            n_rows_skip: N_ROWS_HEADER_SKIP,
            if_keep_blank_rows: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Export call options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportOptions {
    /// Target sheet name (sanitized before use).
    pub sheet_name: String,
    /// Leading columns kept visible while scrolling.
    pub n_cols_frozen: usize,
    pub policy_width: SpecColumnWidthPolicy,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_NAME_EXPORT.to_string(),
            n_cols_frozen: 1,
            policy_width: SpecColumnWidthPolicy::default(),
        }
    }
}

/// Export failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Nothing to export: the dataset has no rows.
    #[error("no table to export: the dataset has no rows")]
    NoTable,
    #[error("failed to build export table: {0}")]
    Table(String),
    #[error("failed to write export workbook: {0}")]
    Write(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Reports

/// Part of a table placed on one worksheet after Excel-limit slicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetSlice {
    pub sheet_name: String,
    /// Source data rows (header excluded).
    pub rows: Range<usize>,
    /// Source columns.
    pub cols: Range<usize>,
}

/// Outcome of one `write_sheet` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    pub sheets: Vec<SpecSheetSlice>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Record and log a warning.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!(target: "opslog_io_xlsx", "{msg}");
        self.warnings.push(msg);
    }

    /// Data rows written, counted once per row band.
    pub fn n_rows_written(&self) -> usize {
        self.sheets
            .iter()
            .filter(|s| s.cols.start == 0)
            .map(|s| s.rows.len())
            .sum()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_policy_clamps_and_pads() {
        let policy = SpecColumnWidthPolicy::default();
        assert_eq!(policy.derive_width(3, 0), Some(8));
        assert_eq!(policy.derive_width(10, 20), Some(22));
        assert_eq!(policy.derive_width(0, 500), Some(60));

        let header_only = SpecColumnWidthPolicy {
            rule: EnumColumnWidthRule::Header,
            ..SpecColumnWidthPolicy::default()
        };
        assert_eq!(header_only.derive_width(10, 40), Some(12));

        let fixed = SpecColumnWidthPolicy {
            rule: EnumColumnWidthRule::Fixed,
            ..SpecColumnWidthPolicy::default()
        };
        assert_eq!(fixed.derive_width(10, 40), None);
    }

    #[test]
    fn width_policy_rejects_inverted_bounds() {
        let policy = SpecColumnWidthPolicy {
            n_width_min: 10,
            n_width_max: 5,
            ..SpecColumnWidthPolicy::default()
        };
        assert!(policy.validate().is_err());
        assert!(SpecColumnWidthPolicy::default().validate().is_ok());
    }

    #[test]
    fn report_counts_rows_once_per_band() {
        let report = SpecXlsxReport {
            sheets: vec![
                SpecSheetSlice {
                    sheet_name: "Log_1".to_string(),
                    rows: 0..4,
                    cols: 0..10,
                },
                SpecSheetSlice {
                    sheet_name: "Log_2".to_string(),
                    rows: 0..4,
                    cols: 10..12,
                },
            ],
            warnings: vec![],
        };
        assert_eq!(report.n_rows_written(), 4);
    }
}
