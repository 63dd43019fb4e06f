//! Column sanitizer seam: strips placeholder columns and the leading index column.

use std::collections::HashSet;

use crate::conf::C_PREFIX_PLACEHOLDER_COLUMN;
use crate::spec::SheetRows;

/// Pure `rows -> rows` cleaning step applied to each sheet before merging.
///
/// Implementations must keep the row count; rows that end up blank are still
/// passed through.
pub trait ColumnSanitizer: Send + Sync {
    /// Clean one sheet.
    fn sanitize(&self, sheet: SheetRows) -> SheetRows;
}

impl<F> ColumnSanitizer for F
where
    F: Fn(SheetRows) -> SheetRows + Send + Sync,
{
    fn sanitize(&self, sheet: SheetRows) -> SheetRows {
        self(sheet)
    }
}

/// Default sanitizer for log workbooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizerDefault {
    /// Drop the first positional column (spreadsheet index artifact).
    pub if_drop_first_column: bool,
    /// Header prefixes that mark placeholder columns.
    pub prefixes_placeholder: Vec<String>,
}

impl Default for SanitizerDefault {
    fn default() -> Self {
        Self {
            if_drop_first_column: true,
            prefixes_placeholder: vec![C_PREFIX_PLACEHOLDER_COLUMN.to_string()],
        }
    }
}

impl SanitizerDefault {
    /// Whether `name` is blank or carries a placeholder prefix.
    pub fn is_placeholder_column(&self, name: &str) -> bool {
        let name = name.trim();
        name.is_empty()
            || self
                .prefixes_placeholder
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl ColumnSanitizer for SanitizerDefault {
    fn sanitize(&self, sheet: SheetRows) -> SheetRows {
        let SheetRows {
            sheet_name,
            columns,
            mut rows,
        } = sheet;

        // Without a header list the first key of the first row is the positional first column.
        let name_col_first = columns
            .first()
            .cloned()
            .or_else(|| rows.first().and_then(|row| row.keys().next().map(str::to_string)));

        let mut set_cols_dropped: HashSet<String> = HashSet::new();
        if self.if_drop_first_column
            && let Some(name) = name_col_first
        {
            set_cols_dropped.insert(name);
        }

        let columns_kept: Vec<String> = columns
            .into_iter()
            .filter(|name| !set_cols_dropped.contains(name) && !self.is_placeholder_column(name))
            .collect();

        for row in &mut rows {
            row.retain(|key, _| !set_cols_dropped.contains(key) && !self.is_placeholder_column(key));
        }

        tracing::debug!(
            target: "opslog_merge",
            sheet = %sheet_name,
            cols_kept = columns_kept.len(),
            rows = rows.len(),
            "sanitized sheet"
        );

        SheetRows {
            sheet_name,
            columns: columns_kept,
            rows,
        }
    }
}
