//! Schema reconciliation: union of column names, every row filled to it.

use std::collections::{HashMap, HashSet};

use crate::spec::{CellValue, RawRow};

/// Union of all column names, in order of first appearance.
pub fn derive_column_union(rows: &[RawRow]) -> Vec<String> {
    let mut set_seen: HashSet<&str> = HashSet::new();
    let mut l_columns = Vec::new();
    for row in rows {
        for key in row.keys() {
            if set_seen.insert(key) {
                l_columns.push(key.to_string());
            }
        }
    }
    l_columns
}

/// Lay every row out over the column union, filling absent cells with
/// [`CellValue::Empty`].
///
/// Output rows share one key set in one order.
pub fn reconcile(rows: Vec<RawRow>) -> Vec<RawRow> {
    let l_columns = derive_column_union(&rows);
    reconcile_with_columns(rows, &l_columns)
}

pub(crate) fn reconcile_with_columns(rows: Vec<RawRow>, columns: &[String]) -> Vec<RawRow> {
    rows.into_iter()
        .map(|row| {
            let mut dict_cells: HashMap<String, CellValue> = row.into_iter().collect();
            let cells = columns
                .iter()
                .map(|key| {
                    let value = dict_cells.remove(key).unwrap_or_default();
                    (key.clone(), value)
                })
                .collect();
            RawRow::from_unique_cells(cells)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::N_COLS_UNION_MAX;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn union_keeps_first_appearance_order() {
        let rows = vec![row(&[("X", "1"), ("Y", "2")]), row(&[("Z", "3"), ("Y", "4")])];
        assert_eq!(derive_column_union(&rows), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn reconcile_fills_missing_cells_with_empty() {
        let rows = reconcile(vec![
            row(&[("X", "a"), ("Y", "b")]),
            row(&[("Y", "c"), ("Z", "d")]),
        ]);

        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert_eq!(r.keys().collect::<Vec<_>>(), vec!["X", "Y", "Z"]);
        }
        assert_eq!(rows[0].get("Z"), Some(&CellValue::Empty));
        assert_eq!(rows[1].get("X"), Some(&CellValue::Empty));
        assert_eq!(rows[1].get("Y"), Some(&CellValue::Text("c".to_string())));
    }

    #[test]
    fn reconcile_handles_excel_wide_unions() {
        let l_rows: Vec<RawRow> = (0..4)
            .map(|n_part| {
                (0..N_COLS_UNION_MAX / 4)
                    .map(|n_col| (format!("C{n_part}_{n_col}"), "v"))
                    .collect()
            })
            .collect();
        let rows = reconcile(l_rows);

        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == N_COLS_UNION_MAX));
        assert_eq!(rows[3].get("C0_0"), Some(&CellValue::Empty));
        assert_eq!(rows[3].get("C3_0"), Some(&CellValue::Text("v".to_string())));
        assert!(rows[0].keys().eq(rows[3].keys()));
    }

    #[test]
    fn reconcile_of_nothing_is_nothing() {
        assert!(reconcile(vec![]).is_empty());
    }
}
