//! Stateless helper utilities shared by the reader and the writer kernel.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Range;

use opslog_merge::{C_PREFIX_PLACEHOLDER_COLUMN, CellValue};

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumXlsxCell, SpecSheetSlice, SpecXlsxReport};

////////////////////////////////////////////////////////////////////////////////
// #region CellConversion

/// Fit one cell to its column kind.
///
/// Numeric columns take numbers and numeric-looking text as numbers; empty
/// text and non-finite numbers become blank, other text is kept verbatim so
/// nothing typed by a person is lost. Text columns render numbers as text.
pub fn convert_cell_for_column(value: EnumXlsxCell, if_numeric_col: bool) -> EnumXlsxCell {
    match (value, if_numeric_col) {
        (EnumXlsxCell::Blank, _) => EnumXlsxCell::Blank,
        (EnumXlsxCell::Number(n), false) => EnumXlsxCell::Text(CellValue::Number(n).to_string()),
        (EnumXlsxCell::Number(n), true) if n.is_finite() => EnumXlsxCell::Number(n),
        (EnumXlsxCell::Number(_), true) => EnumXlsxCell::Blank,
        (EnumXlsxCell::Text(s), false) => EnumXlsxCell::Text(s),
        (EnumXlsxCell::Text(s), true) => {
            let txt = s.trim();
            if txt.is_empty() {
                return EnumXlsxCell::Blank;
            }
            match txt.parse::<f64>() {
                Ok(n) if n.is_finite() => EnumXlsxCell::Number(n),
                _ => EnumXlsxCell::Text(s),
            }
        }
    }
}

/// Rough display width: non-ASCII glyphs count as 1.6 columns.
pub fn estimate_text_width(text: &str) -> usize {
    let (n_ascii, n_wide) = text.chars().fold((0usize, 0usize), |(n_a, n_w), chr| {
        if chr.is_ascii() { (n_a + 1, n_w) } else { (n_a, n_w + 1) }
    });
    n_ascii + (n_wide as f64 * 1.6).round() as usize
}

/// Display width of a converted cell.
pub fn estimate_cell_width(value: &EnumXlsxCell) -> usize {
    match value {
        EnumXlsxCell::Blank => 0,
        EnumXlsxCell::Text(s) => estimate_text_width(s),
        EnumXlsxCell::Number(n) => format!("{n:.2}").len(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnNames

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {l_pos:?}", l_pos.len()))
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Turn a raw header row into unique column names.
///
/// Blank cells become `__EMPTY`, `__EMPTY_1`, ...; a repeated name gets the
/// next free `_N` suffix.
pub fn derive_unique_headers<S: AsRef<str>>(raw_headers: &[S]) -> Vec<String> {
    let mut set_seen: HashSet<String> = HashSet::with_capacity(raw_headers.len());
    let mut l_headers = Vec::with_capacity(raw_headers.len());

    for raw in raw_headers {
        let c_trimmed = raw.as_ref().trim();
        let c_base = if c_trimmed.is_empty() {
            C_PREFIX_PLACEHOLDER_COLUMN
        } else {
            c_trimmed
        };

        let mut c_name = c_base.to_string();
        let mut n_suffix = 1usize;
        while set_seen.contains(&c_name) {
            c_name = format!("{c_base}_{n_suffix}");
            n_suffix += 1;
        }
        set_seen.insert(c_name.clone());
        l_headers.push(c_name);
    }
    l_headers
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Make `name` a legal worksheet name: illegal characters replaced, outer
/// quotes/space trimmed, `Sheet` when nothing is left, 31 chars max.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let c_replaced = TUP_EXCEL_ILLEGAL
        .iter()
        .fold(name.to_string(), |c_acc, c_illegal| c_acc.replace(c_illegal, replace_to));
    let c_trimmed = c_replaced.trim().trim_matches('\'');
    let c_name = if c_trimmed.is_empty() { "Sheet" } else { c_trimmed };
    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Split an `n_rows x n_cols` table (one header row) into worksheet-sized
/// slices, column bands first.
///
/// A table that fits keeps `sheet_name`; otherwise parts are numbered
/// `name_1`, `name_2`, ... and a warning is recorded.
pub fn plan_sheet_slices(
    n_rows: usize,
    n_cols: usize,
    sheet_name: &str,
    report: &mut SpecXlsxReport,
) -> Vec<SpecSheetSlice> {
    let l_col_bands = derive_bounded_spans(n_cols, N_NCOLS_EXCEL_MAX);
    let mut l_row_bands = derive_bounded_spans(n_rows, N_NROWS_EXCEL_MAX - 1);
    if l_row_bands.is_empty() {
        l_row_bands.push(0..0);
    }

    let n_parts = l_col_bands.len() * l_row_bands.len();
    let l_slices: Vec<SpecSheetSlice> = l_col_bands
        .iter()
        .flat_map(|cols| l_row_bands.iter().map(move |rows| (rows.clone(), cols.clone())))
        .enumerate()
        .map(|(n_idx, (rows, cols))| SpecSheetSlice {
            sheet_name: if n_parts == 1 {
                sheet_name.to_string()
            } else {
                derive_part_sheet_name(sheet_name, n_idx + 1)
            },
            rows,
            cols,
        })
        .collect();

    if n_parts > 1 {
        report.warn(format!(
            "table {n_rows}x{n_cols} exceeds Excel limits: split into {n_parts} sheets"
        ));
    }
    l_slices
}

fn derive_bounded_spans(n_total: usize, n_span_max: usize) -> Vec<Range<usize>> {
    let n_step = n_span_max.max(1);
    (0..n_total)
        .step_by(n_step)
        .map(|n_start| n_start..n_total.min(n_start + n_step))
        .collect()
}

/// `base_N`, truncating `base` so the result fits the sheet name limit.
pub fn derive_part_sheet_name(base_name: &str, n_part: usize) -> String {
    let c_suffix = format!("_{n_part}");
    let n_len_base = N_LEN_EXCEL_SHEET_NAME_MAX
        .saturating_sub(c_suffix.len())
        .max(1);
    let c_base: String = base_name.chars().take(n_len_base).collect();
    format!("{c_base}{c_suffix}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
