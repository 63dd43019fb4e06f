//! Date canonicalization and chronological ordering.
//!
//! Rows without a resolvable date carry `Date = ""` and sort before every
//! dated row, as if dated at the epoch. Ties keep their input order.

use chrono::NaiveDate;

use crate::conf::C_FIELD_DATE;
use crate::spec::{CanonicalDataset, CellValue, NormalizedRow, PipelineError, RawRow};
use crate::util::{
    convert_excel_serial_to_date, format_iso_date, parse_date_text, parse_leading_iso_date,
};

/// Resolve the calendar date of one row.
///
/// The `Date` cell is tried first (text in any accepted format, or an Excel
/// serial number). Otherwise the first other text value starting with a valid
/// `YYYY-MM-DD` is adopted.
pub fn resolve_row_date(row: &RawRow) -> Option<NaiveDate> {
    let date_field = match row.get(C_FIELD_DATE) {
        Some(CellValue::Text(txt)) => parse_date_text(txt),
        Some(CellValue::Number(serial)) => convert_excel_serial_to_date(*serial),
        Some(CellValue::Empty) | None => None,
    };
    if date_field.is_some() {
        return date_field;
    }

    row.iter()
        .filter(|(key, _)| *key != C_FIELD_DATE)
        .filter_map(|(_, value)| value.as_text())
        .find_map(parse_leading_iso_date)
}

/// Canonicalize `Date` on every row and stable-sort ascending by it.
///
/// Rows lacking a `Date` column get one at the front.
pub fn normalize(rows: Vec<RawRow>) -> Vec<NormalizedRow> {
    let l_dates = rows.iter().map(resolve_row_date).collect();
    normalize_with_dates(rows, l_dates)
}

/// [`normalize`] with dates already resolved, one per row.
///
/// The pipeline resolves dates before reconciliation so the fallback scan
/// sees each row in its own sheet's column order.
pub(crate) fn normalize_with_dates(
    rows: Vec<RawRow>,
    dates: Vec<Option<NaiveDate>>,
) -> Vec<NormalizedRow> {
    let mut l_rows_dated: Vec<(Option<NaiveDate>, NormalizedRow)> = rows
        .into_iter()
        .zip(dates)
        .map(|(mut row, date)| {
            let value_date = date.map_or(CellValue::Empty, |d| CellValue::Text(format_iso_date(d)));
            if row.contains_key(C_FIELD_DATE) {
                row.insert(C_FIELD_DATE, value_date);
            } else {
                row.insert_first(C_FIELD_DATE, value_date);
            }
            let cells = row
                .into_iter()
                .map(|(key, value)| (key, value.to_string()))
                .collect();
            (date, NormalizedRow::from_cells(cells))
        })
        .collect();

    // `None < Some(_)`: undated rows lead.
    l_rows_dated.sort_by(|a, b| a.0.cmp(&b.0));
    l_rows_dated.into_iter().map(|(_, row)| row).collect()
}

/// Check that every row carries exactly `dataset.columns()` in order and that
/// dates never decrease.
pub fn validate_dataset(dataset: &CanonicalDataset) -> Result<(), PipelineError> {
    if !dataset.columns().iter().any(|c| c == C_FIELD_DATE) {
        return Err(PipelineError::Normalize(format!(
            "schema lacks the {C_FIELD_DATE:?} column"
        )));
    }

    for (n_idx, row) in dataset.rows().iter().enumerate() {
        if !row.keys().eq(dataset.columns().iter().map(String::as_str)) {
            return Err(PipelineError::Normalize(format!(
                "row {n_idx} does not match the dataset schema ({} vs {} columns)",
                row.len(),
                dataset.columns().len()
            )));
        }
    }

    for (n_idx, pair) in dataset.rows().windows(2).enumerate() {
        if pair[0].date() > pair[1].date() {
            return Err(PipelineError::Normalize(format!(
                "rows {n_idx} and {} are out of order ({:?} > {:?})",
                n_idx + 1,
                pair[0].date(),
                pair[1].date()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn date_fallback_uses_embedded_leading_iso_date() {
        let r = row(&[("Title", "outage"), ("Summary", "2024-03-02 report")]);
        let rows = normalize(vec![r]);
        assert_eq!(rows[0].date(), "2024-03-02");
        assert_eq!(rows[0].keys().next(), Some(C_FIELD_DATE));
    }

    #[test]
    fn date_cell_formats_are_canonicalized() {
        let mut r_serial = RawRow::new();
        r_serial.insert(C_FIELD_DATE, 45292.0);
        let rows = normalize(vec![
            row(&[(C_FIELD_DATE, "1/5/2024")]),
            r_serial,
            row(&[(C_FIELD_DATE, "2024-01-03T08:00:00Z")]),
        ]);
        let l_dates: Vec<&str> = rows.iter().map(NormalizedRow::date).collect();
        assert_eq!(l_dates, vec!["2024-01-01", "2024-01-03", "2024-01-05"]);
    }

    #[test]
    fn unparseable_date_cell_falls_back_then_empties() {
        let rows = normalize(vec![
            row(&[(C_FIELD_DATE, "TBD"), ("Ticket", "2024-02-10-77")]),
            row(&[(C_FIELD_DATE, "TBD"), ("Ticket", "none")]),
        ]);
        assert_eq!(rows[0].date(), "");
        assert_eq!(rows[1].date(), "2024-02-10");
    }

    #[test]
    fn undated_rows_sort_first_and_ties_keep_order() {
        let rows = normalize(vec![
            row(&[(C_FIELD_DATE, "2024-01-02"), ("Id", "a")]),
            row(&[(C_FIELD_DATE, ""), ("Id", "b")]),
            row(&[(C_FIELD_DATE, "2024-01-01"), ("Id", "c")]),
            row(&[(C_FIELD_DATE, "2024-01-02"), ("Id", "d")]),
            row(&[(C_FIELD_DATE, "garbage"), ("Id", "e")]),
        ]);
        let l_ids: Vec<&str> = rows.iter().filter_map(|r| r.get("Id")).collect();
        assert_eq!(l_ids, vec!["b", "e", "c", "a", "d"]);
        for pair in rows.windows(2) {
            assert!(pair[0].date() <= pair[1].date());
        }
    }

    #[test]
    fn normalize_keeps_rectangular_input_rectangular() {
        let rows = normalize(reconcile(vec![
            row(&[("A", "2024-05-01 start")]),
            row(&[("B", "x"), (C_FIELD_DATE, "2024-04-01")]),
        ]));
        let l_keys_first: Vec<&str> = rows[0].keys().collect();
        assert_eq!(l_keys_first, vec!["A", "B", C_FIELD_DATE]);
        for r in &rows {
            assert_eq!(r.keys().collect::<Vec<_>>(), l_keys_first);
        }
        assert_eq!(rows[0].date(), "2024-04-01");
        assert_eq!(rows[1].date(), "2024-05-01");
    }

    #[test]
    fn validate_rejects_unsorted_and_ragged_datasets() {
        let columns = vec![C_FIELD_DATE.to_string(), "A".to_string()];
        let cell = |k: &str, v: &str| (k.to_string(), v.to_string());

        let unsorted = CanonicalDataset::new(
            columns.clone(),
            vec![
                NormalizedRow::from_cells(vec![cell(C_FIELD_DATE, "2024-02-01"), cell("A", "")]),
                NormalizedRow::from_cells(vec![cell(C_FIELD_DATE, "2024-01-01"), cell("A", "")]),
            ],
        );
        assert!(matches!(
            validate_dataset(&unsorted),
            Err(PipelineError::Normalize(_))
        ));

        let ragged = CanonicalDataset::new(
            columns.clone(),
            vec![NormalizedRow::from_cells(vec![cell(C_FIELD_DATE, "")])],
        );
        assert!(matches!(
            validate_dataset(&ragged),
            Err(PipelineError::Normalize(_))
        ));

        let ok = CanonicalDataset::new(
            columns,
            vec![
                NormalizedRow::from_cells(vec![cell(C_FIELD_DATE, ""), cell("A", "x")]),
                NormalizedRow::from_cells(vec![cell(C_FIELD_DATE, "2024-01-01"), cell("A", "")]),
            ],
        );
        assert_eq!(validate_dataset(&ok), Ok(()));
    }
}
