//! Single entry point of the unification pipeline.

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::conf::C_FIELD_DATE;
use crate::normalize::{normalize_with_dates, resolve_row_date, validate_dataset};
use crate::reconcile::{derive_column_union, reconcile_with_columns};
use crate::recurrence::collect_note_rows;
use crate::report::{ReportPipeline, ReportPipelineBuilder};
use crate::sanitize::ColumnSanitizer;
use crate::spec::{
    AdminNote, CanonicalDataset, PipelineError, RawRow, RecurrenceWindow, SheetRows,
    SpecPipelineOptions,
};

/// Complete input of one run.
#[derive(Debug, Clone)]
pub struct SpecPipelineInput {
    /// Sheets in workbook enumeration order.
    pub sheets: Vec<SheetRows>,
    /// Admin notes in storage order.
    pub notes: Vec<AdminNote>,
    /// Window for weekly notes.
    pub window: RecurrenceWindow,
}

/// Result of one successful run.
#[derive(Debug, Clone)]
pub struct SpecPipelineOutput {
    /// Rectangular, chronologically ordered rows.
    pub dataset: CanonicalDataset,
    /// Counters and absorbed warnings.
    pub report: ReportPipeline,
}

/// Turn sheets plus admin notes into one canonical dataset.
///
/// Steps:
/// 1. Per-sheet sanitization, in parallel, enumeration order kept.
/// 2. Note rows: weekly notes expanded over the window (`Expand` failure when
///    a note recurs and the window spans too many days), dated notes as-is.
/// 3. Concatenation: sheet rows, then note rows.
/// 4. Row dates resolved from each row's own cells.
/// 5. Schema union (`Reconcile` failure when too wide) and fill.
/// 6. Date canonicalization and stable chronological sort.
/// 7. Optional output validation (`Normalize` failure).
///
/// Either the whole dataset is returned or a single [`PipelineError`].
pub fn build_canonical_dataset(
    input: SpecPipelineInput,
    sanitizer: &dyn ColumnSanitizer,
    options: &SpecPipelineOptions,
) -> Result<SpecPipelineOutput, PipelineError> {
    let SpecPipelineInput {
        sheets,
        notes,
        window,
    } = input;

    let mut builder = ReportPipelineBuilder::default();

    let l_sheets_clean: Vec<SheetRows> = sheets
        .into_par_iter()
        .map(|sheet| sanitizer.sanitize(sheet))
        .collect();

    let mut l_rows: Vec<RawRow> = Vec::new();
    for sheet in l_sheets_clean {
        builder.add_sheet(sheet.rows.len());
        tracing::debug!(
            target: "opslog_merge",
            sheet = %sheet.sheet_name,
            rows = sheet.rows.len(),
            "merged sheet"
        );
        l_rows.extend(sheet.rows);
    }

    let l_rows_note =
        collect_note_rows(&notes, &window, options.n_days_window_max, &mut builder)?;
    tracing::debug!(
        target: "opslog_merge",
        notes = notes.len(),
        rows = l_rows_note.len(),
        "collected note rows"
    );
    l_rows.extend(l_rows_note);

    // Before reconciliation reorders cells into union order.
    let l_dates: Vec<Option<NaiveDate>> = l_rows.par_iter().map(resolve_row_date).collect();

    let l_columns = derive_column_union(&l_rows);
    if l_columns.len() > options.n_cols_union_max {
        return Err(PipelineError::Reconcile(format!(
            "schema union has {} columns (max {})",
            l_columns.len(),
            options.n_cols_union_max
        )));
    }
    let l_rows = reconcile_with_columns(l_rows, &l_columns);

    let l_rows_norm = normalize_with_dates(l_rows, l_dates);
    let l_columns_final = match l_rows_norm.first() {
        Some(row) => row.keys().map(str::to_string).collect(),
        None => {
            let mut l_cols = l_columns;
            if !l_cols.iter().any(|c| c == C_FIELD_DATE) {
                l_cols.insert(0, C_FIELD_DATE.to_string());
            }
            l_cols
        }
    };
    let dataset = CanonicalDataset::new(l_columns_final, l_rows_norm);

    if options.if_validate_output {
        validate_dataset(&dataset)?;
    }

    let n_rows_undated = dataset.rows().iter().filter(|r| r.date().is_empty()).count();
    if n_rows_undated > 0 {
        builder.add_warning(format!(
            "{n_rows_undated} row(s) have no resolvable date and sort first"
        ));
    }
    let report = builder.build(dataset.len(), dataset.columns().len(), n_rows_undated);
    tracing::info!(target: "opslog_merge", "{report}");

    Ok(SpecPipelineOutput { dataset, report })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::sanitize::SanitizerDefault;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn sheet(name: &str, columns: &[&str], rows: &[&[&str]]) -> SheetRows {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .iter()
            .map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values.iter().copied())
                    .collect::<RawRow>()
            })
            .collect();
        SheetRows {
            sheet_name: name.to_string(),
            columns,
            rows,
        }
    }

    fn assert_rectangular_and_sorted(dataset: &CanonicalDataset) {
        for row in dataset.rows() {
            assert!(row.keys().eq(dataset.columns().iter().map(String::as_str)));
        }
        for pair in dataset.rows().windows(2) {
            assert!(pair[0].date() <= pair[1].date());
        }
    }

    #[test]
    fn two_sheets_plus_weekly_note_over_two_tuesdays() {
        let sheets = vec![
            sheet(
                "2023",
                &["#", "Date", "Incident", "Region", "__EMPTY"],
                &[&["1", "2024-01-10", "Router swap", "East", ""]],
            ),
            sheet(
                "2024",
                &["#", "Date", "Incident", "Ticket #"],
                &[&["1", "2024-01-03", "DNS outage", "T-9"]],
            ),
        ];
        let note = AdminNote {
            id: Some(11),
            incident: "Weekly patching".to_string(),
            weekday: Some("Tuesday".to_string()),
            ..AdminNote::default()
        };
        // 2024-01-01 (Mon) .. 2024-01-14 (Sun): Tuesdays are the 2nd and the 9th.
        let input = SpecPipelineInput {
            sheets,
            notes: vec![note],
            window: RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 14)),
        };

        let output = build_canonical_dataset(
            input,
            &SanitizerDefault::default(),
            &SpecPipelineOptions::default(),
        )
        .expect("pipeline run");
        let dataset = &output.dataset;

        assert_eq!(dataset.len(), 4);
        assert_rectangular_and_sorted(dataset);
        let l_dates: Vec<&str> = dataset.rows().iter().map(|r| r.date()).collect();
        assert_eq!(l_dates, vec!["2024-01-02", "2024-01-03", "2024-01-09", "2024-01-10"]);
        assert!(!dataset.columns().iter().any(|c| c == "#" || c == "__EMPTY"));
        assert!(dataset.columns().iter().any(|c| c == "Region"));
        assert!(dataset.columns().iter().any(|c| c == "Maintenance Event"));
        assert_eq!(dataset.rows()[0].get("Region"), Some(""));
        assert_eq!(dataset.rows()[1].get("Ticket #"), Some("T-9"));

        assert_eq!(output.report.cnt_sheets, 2);
        assert_eq!(output.report.cnt_rows_sheet, 2);
        assert_eq!(output.report.cnt_rows_expanded, 2);
        assert_eq!(output.report.cnt_rows_total, 4);
        assert_eq!(output.report.cnt_rows_undated, 0);
    }

    #[test]
    fn equal_dates_keep_sheet_then_note_order() {
        let sheets = vec![
            sheet("A", &["#", "Date", "Incident"], &[&["1", "2024-01-02", "from A"]]),
            sheet("B", &["#", "Date", "Incident"], &[&["1", "2024-01-02", "from B"]]),
        ];
        let note = AdminNote {
            incident: "from note".to_string(),
            date: Some(ymd(2024, 1, 2)),
            ..AdminNote::default()
        };
        let input = SpecPipelineInput {
            sheets,
            notes: vec![note],
            window: RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 31)),
        };

        let output = build_canonical_dataset(
            input,
            &SanitizerDefault::default(),
            &SpecPipelineOptions::default(),
        )
        .expect("pipeline run");
        let l_incidents: Vec<&str> = output.dataset.column_values("Incident").collect();
        assert_eq!(l_incidents, vec!["from A", "from B", "from note"]);
    }

    #[test]
    fn empty_input_yields_empty_dataset_with_date_column() {
        let input = SpecPipelineInput {
            sheets: vec![],
            notes: vec![],
            window: RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 31)),
        };
        let output = build_canonical_dataset(
            input,
            &SanitizerDefault::default(),
            &SpecPipelineOptions::default(),
        )
        .expect("pipeline run");
        assert!(output.dataset.is_empty());
        assert_eq!(output.dataset.columns(), &[C_FIELD_DATE.to_string()]);
    }

    #[test]
    fn oversized_window_fails_only_with_a_recurring_note() {
        let sheets = || vec![sheet("A", &["#", "Date"], &[&["1", "2010-06-01"]])];
        let window = RecurrenceWindow::new(ymd(2000, 1, 1), ymd(2024, 1, 1));

        let output = build_canonical_dataset(
            SpecPipelineInput {
                sheets: sheets(),
                notes: vec![AdminNote {
                    date: Some(ymd(2011, 1, 1)),
                    ..AdminNote::default()
                }],
                window,
            },
            &SanitizerDefault::default(),
            &SpecPipelineOptions::default(),
        )
        .expect("nothing to expand");
        assert_eq!(output.dataset.len(), 2);

        let err = build_canonical_dataset(
            SpecPipelineInput {
                sheets: sheets(),
                notes: vec![AdminNote {
                    weekday: Some("Monday".to_string()),
                    ..AdminNote::default()
                }],
                window,
            },
            &SanitizerDefault::default(),
            &SpecPipelineOptions::default(),
        )
        .expect_err("must fail");
        assert!(matches!(err, PipelineError::Expand(_)));
    }

    #[test]
    fn fallback_date_ignores_column_order_of_other_sheets() {
        let sheet_b = || {
            sheet(
                "B",
                &["#", "Summary", "Ticket"],
                &[&["1", "2024-03-02 report", "2024-05-01-77"]],
            )
        };
        let run = |sheets: Vec<SheetRows>| {
            build_canonical_dataset(
                SpecPipelineInput {
                    sheets,
                    notes: vec![],
                    window: RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 31)),
                },
                &SanitizerDefault::default(),
                &SpecPipelineOptions::default(),
            )
            .expect("pipeline run")
            .dataset
        };

        let alone = run(vec![sheet_b()]);
        let with_a = run(vec![
            sheet("A", &["#", "Ticket"], &[&["1", "T-1"]]),
            sheet_b(),
        ]);

        assert_eq!(alone.rows()[0].date(), "2024-03-02");
        let row_b = with_a
            .rows()
            .iter()
            .find(|row| row.get("Summary") == Some("2024-03-02 report"))
            .expect("sheet B row");
        assert_eq!(row_b.date(), "2024-03-02");
    }

    #[test]
    fn too_wide_union_fails_in_reconcile_stage() {
        let sheets = vec![
            sheet("A", &["#", "Date", "X"], &[&["1", "2024-01-02", "x"]]),
            sheet("B", &["#", "Date", "Y"], &[&["1", "2024-01-03", "y"]]),
        ];
        let input = SpecPipelineInput {
            sheets,
            notes: vec![],
            window: RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 31)),
        };
        let options = SpecPipelineOptions {
            n_cols_union_max: 2,
            ..SpecPipelineOptions::default()
        };
        let err = build_canonical_dataset(input, &SanitizerDefault::default(), &options)
            .expect_err("must fail");
        assert!(matches!(err, PipelineError::Reconcile(_)));
    }

    #[test]
    fn undated_rows_are_reported_not_rejected() {
        let sheets = vec![sheet(
            "A",
            &["#", "Incident"],
            &[&["1", "no date here"], &["2", "2024-01-05 follow-up"]],
        )];
        let input = SpecPipelineInput {
            sheets,
            notes: vec![],
            window: RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 31)),
        };
        let output = build_canonical_dataset(
            input,
            &SanitizerDefault::default(),
            &SpecPipelineOptions::default(),
        )
        .expect("pipeline run");

        assert_eq!(output.dataset.columns()[0], C_FIELD_DATE);
        let l_dates: Vec<&str> = output.dataset.column_values(C_FIELD_DATE).collect();
        assert_eq!(l_dates, vec!["", "2024-01-05"]);
        assert_eq!(output.report.cnt_rows_undated, 1);
        assert_eq!(output.report.warning_count(), 1);
    }
}
