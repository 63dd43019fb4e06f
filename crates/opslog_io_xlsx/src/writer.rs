//! XLSX writer kernel laying polars DataFrames out as styled worksheets.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use polars::prelude::{AnyValue, Column, DataFrame};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::conf::N_LEN_EXCEL_SHEET_NAME_MAX;
use crate::spec::{
    EnumCellAlign, EnumXlsxCell, SpecCellStyle, SpecColumnWidthPolicy, SpecSheetSlice,
    SpecXlsxReport, SpecXlsxWriteOptions,
};
use crate::util::{
    convert_cell_for_column, estimate_cell_width, estimate_text_width, plan_sheet_slices,
    sanitize_sheet_name, validate_unique_columns,
};

/// Per-sheet call options.
#[derive(Default, Debug, Clone)]
pub struct SpecXlsxSheetWriteOptions {
    /// Columns written as numbers even when their dtype is text
    /// (numeric-looking text parsed, empty text left blank).
    pub cols_numeric: Vec<String>,
    /// Leading columns kept visible while scrolling; the header row is always frozen.
    pub n_cols_frozen: usize,
    pub policy_width: SpecColumnWidthPolicy,
}

struct SpecSheetFormats {
    header: Format,
    text: Format,
    hours: Format,
}

/// Stateful workbook writer.
///
/// Sheets stay in memory until [`Self::close`] (bound path) or
/// [`Self::save_to_buffer`] is called; either one ends the writer.
pub struct XlsxWriter {
    path_file_out: Option<PathBuf>,
    workbook: Workbook,
    formats: SpecSheetFormats,
    if_infer_numeric_cols: bool,
    set_sheet_names: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Writer bound to an output path.
    pub fn new(path_file_out: impl Into<PathBuf>, options: SpecXlsxWriteOptions) -> Self {
        Self::build(Some(path_file_out.into()), options)
    }

    /// Writer without a path; finish with [`Self::save_to_buffer`].
    pub fn in_memory(options: SpecXlsxWriteOptions) -> Self {
        Self::build(None, options)
    }

    fn build(path_file_out: Option<PathBuf>, options: SpecXlsxWriteOptions) -> Self {
        let styles = &options.styles;
        Self {
            path_file_out,
            workbook: Workbook::new(),
            formats: SpecSheetFormats {
                header: derive_rust_xlsx_format(&styles.header),
                text: derive_rust_xlsx_format(&styles.text),
                hours: derive_rust_xlsx_format(&styles.hours),
            },
            if_infer_numeric_cols: options.if_infer_numeric_cols,
            set_sheet_names: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    pub fn file_out(&self) -> Option<&Path> {
        self.path_file_out.as_deref()
    }

    /// Reports of every `write_sheet` call so far.
    pub fn report(&self) -> &[SpecXlsxReport] {
        &self.l_reports
    }

    /// Save to the bound path. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        let Some(path_file_out) = self.path_file_out.as_ref() else {
            return Err("writer has no output path; use save_to_buffer()".to_string());
        };
        self.workbook
            .save(path_file_out)
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        tracing::debug!(target: "opslog_io_xlsx", path = %path_file_out.display(), "workbook saved");
        Ok(())
    }

    /// Serialize the workbook and end the writer.
    pub fn save_to_buffer(&mut self) -> Result<Vec<u8>, String> {
        if self.if_closed {
            return Err("writer already closed".to_string());
        }
        let v_bytes = self
            .workbook
            .save_to_buffer()
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        Ok(v_bytes)
    }

    /// Write one DataFrame under `sheet_name`, splitting it over several
    /// worksheets when it exceeds Excel limits.
    pub fn write_sheet(
        &mut self,
        df_data: &DataFrame,
        sheet_name: &str,
        options: &SpecXlsxSheetWriteOptions,
    ) -> Result<SpecXlsxReport, String> {
        if self.if_closed {
            return Err("writer already closed".to_string());
        }
        options.policy_width.validate()?;

        let l_colnames: Vec<String> = df_data
            .get_column_names_str()
            .into_iter()
            .map(str::to_string)
            .collect();
        validate_unique_columns(&l_colnames)?;
        let set_idx_numeric = derive_numeric_column_indices(
            df_data,
            &l_colnames,
            &options.cols_numeric,
            self.if_infer_numeric_cols,
        )?;

        let mut report = SpecXlsxReport::default();
        let l_slices = plan_sheet_slices(
            df_data.height(),
            l_colnames.len(),
            &sanitize_sheet_name(sheet_name, "_"),
            &mut report,
        );

        for slice in l_slices {
            let sheet_name_unique = self.derive_unique_sheet_name(&slice.sheet_name);
            let worksheet = self.workbook.add_worksheet();
            worksheet
                .set_name(&sheet_name_unique)
                .map_err(derive_xlsx_error_text)?;
            worksheet
                .set_freeze_panes(1, cast_col_num(options.n_cols_frozen)?)
                .map_err(derive_xlsx_error_text)?;

            for (n_col_out, n_col_src) in slice.cols.clone().enumerate() {
                let if_numeric = set_idx_numeric.contains(&n_col_src);
                let col_src = &df_data.get_columns()[n_col_src];
                let c_header = &l_colnames[n_col_src];
                let n_col = cast_col_num(n_col_out)?;

                worksheet
                    .write_string_with_format(0, n_col, c_header, &self.formats.header)
                    .map_err(derive_xlsx_error_text)?;
                let n_width_body = write_body_column(
                    worksheet,
                    n_col,
                    &col_src.slice(slice.rows.start as i64, slice.rows.len()),
                    if if_numeric {
                        &self.formats.hours
                    } else {
                        &self.formats.text
                    },
                    if_numeric,
                    options.policy_width.n_rows_sampled_max,
                )?;

                if let Some(n_width) = options
                    .policy_width
                    .derive_width(estimate_text_width(c_header), n_width_body)
                {
                    worksheet
                        .set_column_width(n_col, n_width as f64)
                        .map_err(derive_xlsx_error_text)?;
                }
            }

            report.sheets.push(SpecSheetSlice {
                sheet_name: sheet_name_unique,
                ..slice
            });
        }

        tracing::debug!(
            target: "opslog_io_xlsx",
            sheet = sheet_name,
            parts = report.sheets.len(),
            rows = df_data.height(),
            "sheet written"
        );
        self.l_reports.push(report.clone());
        Ok(report)
    }

    // Worksheet names are unique case-sensitively here; `name__2`, `name__3`, ... on collision.
    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names.insert(name.to_string()) {
            return name.to_string();
        }
        let c_base: String = name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX - 4).collect();
        let mut n_idx = 2usize;
        loop {
            let c_candidate = format!("{c_base}__{n_idx}");
            if self.set_sheet_names.insert(c_candidate.clone()) {
                return c_candidate;
            }
            n_idx += 1;
        }
    }
}

impl Default for XlsxWriter {
    fn default() -> Self {
        Self::in_memory(SpecXlsxWriteOptions::default())
    }
}

/// Write one column's body cells below the header; returns the widest
/// sampled cell width.
fn write_body_column(
    worksheet: &mut Worksheet,
    n_col: u16,
    col: &Column,
    format: &Format,
    if_numeric: bool,
    n_rows_sampled_max: Option<usize>,
) -> Result<usize, String> {
    let n_rows_sampled = n_rows_sampled_max.unwrap_or(usize::MAX);
    let mut n_width_max = 0usize;
    for n_row in 0..col.len() {
        let value_raw = col
            .get(n_row)
            .map_err(|err| format!("cannot read cell {n_row}: {err}"))?;
        let value = convert_cell_for_column(derive_cell_from_any_value(value_raw), if_numeric);
        if n_row < n_rows_sampled {
            n_width_max = n_width_max.max(estimate_cell_width(&value));
        }

        let n_row_out = cast_row_num(n_row + 1)?;
        match &value {
            EnumXlsxCell::Blank => worksheet.write_blank(n_row_out, n_col, format),
            EnumXlsxCell::Text(s) => worksheet.write_string_with_format(n_row_out, n_col, s, format),
            EnumXlsxCell::Number(n) => worksheet.write_number_with_format(n_row_out, n_col, *n, format),
        }
        .map_err(derive_xlsx_error_text)?;
    }
    Ok(n_width_max)
}

fn derive_numeric_column_indices(
    df: &DataFrame,
    colnames: &[String],
    cols_numeric: &[String],
    if_infer: bool,
) -> Result<BTreeSet<usize>, String> {
    let mut set_idx: BTreeSet<usize> = df
        .get_columns()
        .iter()
        .enumerate()
        .filter(|(_, col)| if_infer && col.dtype().is_numeric())
        .map(|(n_idx, _)| n_idx)
        .collect();

    for c_ref in cols_numeric {
        let n_idx = colnames
            .iter()
            .position(|c_name| c_name == c_ref)
            .ok_or_else(|| format!("numeric column not found: {c_ref:?}"))?;
        set_idx.insert(n_idx);
    }
    Ok(set_idx)
}

fn derive_cell_from_any_value(value: AnyValue<'_>) -> EnumXlsxCell {
    match value {
        AnyValue::Null => EnumXlsxCell::Blank,
        AnyValue::String(val) => EnumXlsxCell::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumXlsxCell::Text(val.to_string()),
        AnyValue::Boolean(val) => EnumXlsxCell::Text(if val { "TRUE" } else { "FALSE" }.to_string()),
        AnyValue::UInt32(val) => EnumXlsxCell::Number(val as f64),
        AnyValue::UInt64(val) => EnumXlsxCell::Number(val as f64),
        AnyValue::Int32(val) => EnumXlsxCell::Number(val as f64),
        AnyValue::Int64(val) => EnumXlsxCell::Number(val as f64),
        AnyValue::Float32(val) => EnumXlsxCell::Number(val as f64),
        AnyValue::Float64(val) => EnumXlsxCell::Number(val),
        other => EnumXlsxCell::Text(other.to_string()),
    }
}

fn derive_rust_xlsx_format(style: &SpecCellStyle) -> Format {
    let align = match style.align {
        EnumCellAlign::Left => FormatAlign::Left,
        EnumCellAlign::Center => FormatAlign::Center,
        EnumCellAlign::Right => FormatAlign::Right,
    };
    let mut format = Format::new()
        .set_font_name(style.font_name.as_str())
        .set_font_size(style.font_size)
        .set_align(align)
        .set_align(FormatAlign::VerticalCenter);

    if style.if_bold {
        format = format.set_bold();
    }
    if style.if_border {
        format = format.set_border(FormatBorder::Thin);
    }
    if let Some(c_num_format) = &style.num_format {
        format = format.set_num_format(c_num_format.as_str());
    }
    if let Some(n_rgb) = style.fill_rgb {
        format = format.set_background_color(n_rgb);
    }
    format
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}
