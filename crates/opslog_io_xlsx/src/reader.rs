//! Multi-sheet workbook reader producing pipeline [`SheetRows`].

use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, TimeDelta};
use opslog_merge::{CellValue, PipelineError, RawRow, SheetRows, WorkbookParser};

use crate::spec::SpecXlsxReadOptions;
use crate::util::derive_unique_headers;

/// Decode workbook bytes (xlsx/xlsm/xlsb/xls/ods, auto-detected) into sheets
/// in workbook order.
///
/// Any decoding failure aborts the whole read with [`PipelineError::Parse`].
pub fn read_workbook_bytes(
    workbook_bytes: &[u8],
    options: &SpecXlsxReadOptions,
) -> Result<Vec<SheetRows>, PipelineError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(workbook_bytes))
        .map_err(|err| PipelineError::Parse(format!("cannot open workbook: {err}")))?;

    let l_sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut l_sheets = Vec::with_capacity(l_sheet_names.len());
    for sheet_name in l_sheet_names {
        let range = workbook.worksheet_range(&sheet_name).map_err(|err| {
            PipelineError::Parse(format!("cannot read sheet {sheet_name:?}: {err}"))
        })?;
        let sheet = derive_sheet_rows(&sheet_name, &range, options);
        tracing::debug!(
            target: "opslog_io_xlsx",
            sheet = %sheet.sheet_name,
            columns = sheet.columns.len(),
            rows = sheet.rows.len(),
            "read sheet"
        );
        l_sheets.push(sheet);
    }
    Ok(l_sheets)
}

/// Lay one calamine range out as header + keyed rows.
///
/// Rows are counted from the top of the worksheet, so leading empty rows the
/// range itself omits still count towards `n_rows_skip`.
pub fn derive_sheet_rows(
    sheet_name: &str,
    range: &Range<Data>,
    options: &SpecXlsxReadOptions,
) -> SheetRows {
    let n_row_first = range.start().map_or(0, |(n_row, _)| n_row as usize);
    let n_rows_skip_local = options.n_rows_skip.saturating_sub(n_row_first);

    let mut iter_rows = range.rows().skip(n_rows_skip_local);
    let Some(row_header) = iter_rows.next() else {
        return SheetRows {
            sheet_name: sheet_name.to_string(),
            columns: vec![],
            rows: vec![],
        };
    };

    let l_headers_raw: Vec<String> = row_header.iter().map(derive_header_text).collect();
    let columns = derive_unique_headers(&l_headers_raw);

    let rows = iter_rows
        .filter(|cells| options.if_keep_blank_rows || !cells.iter().all(is_blank_cell))
        .map(|cells| {
            columns
                .iter()
                .enumerate()
                .map(|(n_idx, key)| {
                    let value = cells.get(n_idx).map_or(CellValue::Empty, convert_cell);
                    (key.clone(), value)
                })
                .collect::<RawRow>()
        })
        .collect();

    SheetRows {
        sheet_name: sheet_name.to_string(),
        columns,
        rows,
    }
}

fn is_blank_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn derive_header_text(cell: &Data) -> String {
    match convert_cell(cell) {
        CellValue::Empty => String::new(),
        value => value.to_string(),
    }
}

/// Convert one calamine cell into a pipeline value.
///
/// Excel dates become `YYYY-MM-DD` text (with `THH:MM:SS` when the cell has a
/// time part); numbers stay numeric.
pub fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(err) => CellValue::Text(format!("#{err:?}")),
        Data::DateTime(dt) => convert_excel_serial_to_text(dt.as_f64())
            .map_or(CellValue::Number(dt.as_f64()), CellValue::Text),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn convert_excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let date_base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let n_secs_total = (serial * 86_400.0).round() as i64;
    let dt = date_base
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_seconds(n_secs_total)?)?;

    if n_secs_total % 86_400 == 0 {
        Some(dt.format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
    }
}

/// [`WorkbookParser`] backed by calamine.
#[derive(Debug, Clone, Default)]
pub struct CalamineWorkbookParser {
    /// Read options applied to every workbook.
    pub options: SpecXlsxReadOptions,
}

impl CalamineWorkbookParser {
    /// Parser with explicit read options.
    pub fn new(options: SpecXlsxReadOptions) -> Self {
        Self { options }
    }
}

impl WorkbookParser for CalamineWorkbookParser {
    fn parse_workbook(&self, workbook_bytes: &[u8]) -> Result<Vec<SheetRows>, PipelineError> {
        read_workbook_bytes(workbook_bytes, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    use super::*;

    fn write_log_sheet(workbook: &mut Workbook, name: &str, header: &[&str], data: &[&str]) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).expect("sheet name");
        worksheet.write_string(0, 0, "Ops Log").expect("banner");
        worksheet.write_string(2, 0, "generated").expect("banner");
        for (n_col, value) in header.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(5, n_col as u16, *value).expect("header");
            }
        }
        for (n_col, value) in data.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(6, n_col as u16, *value).expect("cell");
            }
        }
    }

    fn read_default(bytes: &[u8]) -> Vec<SheetRows> {
        read_workbook_bytes(bytes, &SpecXlsxReadOptions::default()).expect("read")
    }

    #[test]
    fn reader_skips_banner_rows_and_keys_by_header() {
        let mut workbook = Workbook::new();
        write_log_sheet(
            &mut workbook,
            "2023",
            &["#", "Date", "Incident", ""],
            &["1", "2024-01-10", "Router swap", "stray"],
        );
        write_log_sheet(
            &mut workbook,
            "2024",
            &["#", "Date", "Incident", "Date"],
            &["1", "2024-01-03", "", "x"],
        );
        let bytes = workbook.save_to_buffer().expect("buffer");

        let l_sheets = read_default(&bytes);
        assert_eq!(l_sheets.len(), 2);
        assert_eq!(l_sheets[0].sheet_name, "2023");
        assert_eq!(l_sheets[0].columns, vec!["#", "Date", "Incident", "__EMPTY"]);
        assert_eq!(l_sheets[0].rows.len(), 1);
        let row = &l_sheets[0].rows[0];
        assert_eq!(row.get("Incident"), Some(&CellValue::Text("Router swap".to_string())));
        assert_eq!(row.get("__EMPTY"), Some(&CellValue::Text("stray".to_string())));

        assert_eq!(l_sheets[1].columns, vec!["#", "Date", "Incident", "Date_1"]);
        assert_eq!(l_sheets[1].rows[0].get("Incident"), Some(&CellValue::Empty));
        assert_eq!(
            l_sheets[1].rows[0].get("Date_1"),
            Some(&CellValue::Text("x".to_string()))
        );
    }

    #[test]
    fn reader_converts_dates_numbers_and_drops_blank_rows() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let fmt_date = Format::new().set_num_format("yyyy-mm-dd");
        for (n_col, value) in ["#", "Date", "Duration (hrs)"].iter().enumerate() {
            worksheet.write_string(5, n_col as u16, *value).expect("header");
        }
        worksheet.write_number(6, 0, 1.0).expect("cell");
        let date = ExcelDateTime::from_ymd(2024, 1, 3).expect("date");
        worksheet
            .write_datetime_with_format(6, 1, &date, &fmt_date)
            .expect("cell");
        worksheet.write_number(6, 2, 1.5).expect("cell");
        // Row 7 left blank on purpose.
        worksheet.write_number(8, 0, 2.0).expect("cell");
        let bytes = workbook.save_to_buffer().expect("buffer");

        let l_sheets = read_default(&bytes);
        let rows = &l_sheets[0].rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Date"), Some(&CellValue::Text("2024-01-03".to_string())));
        assert_eq!(rows[0].get("Duration (hrs)"), Some(&CellValue::Number(1.5)));
        assert_eq!(rows[1].get("#"), Some(&CellValue::Number(2.0)));
        assert_eq!(rows[1].get("Date"), Some(&CellValue::Empty));
    }

    #[test]
    fn reader_rejects_non_workbook_bytes() {
        let err = read_workbook_bytes(b"definitely not a workbook", &SpecXlsxReadOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn sheet_shorter_than_banner_yields_no_rows() {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .write_string(0, 0, "only a banner")
            .expect("cell");
        let bytes = workbook.save_to_buffer().expect("buffer");

        let l_sheets = read_default(&bytes);
        assert_eq!(l_sheets.len(), 1);
        assert!(l_sheets[0].columns.is_empty());
        assert!(l_sheets[0].rows.is_empty());
    }

    #[test]
    fn excel_serial_text_keeps_time_part_only_when_present() {
        assert_eq!(convert_excel_serial_to_text(45292.0).as_deref(), Some("2024-01-01"));
        assert_eq!(
            convert_excel_serial_to_text(45292.5).as_deref(),
            Some("2024-01-01T12:00:00")
        );
        assert_eq!(convert_excel_serial_to_text(-1.0), None);
    }
}
