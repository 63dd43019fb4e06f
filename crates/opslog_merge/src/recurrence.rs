//! Weekly recurrence expansion of admin notes into concrete dated rows.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::conf::{C_FIELD_DATE, TUP_NOTE_FIELD_MAP, TUP_WEEKDAY_NAMES};
use crate::report::ReportPipelineBuilder;
use crate::spec::{AdminNote, CellValue, PipelineError, RawRow, RecurrenceWindow};
use crate::util::format_iso_date;

/// Resolve an English day name (trimmed, case-insensitive) to a weekday.
pub fn parse_weekday_tag(tag: &str) -> Option<Weekday> {
    let tag = tag.trim();
    TUP_WEEKDAY_NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, weekday)| *weekday)
}

/// Map a note onto the sheet field vocabulary with the given `Date`.
///
/// Column order is `Date` followed by [`TUP_NOTE_FIELD_MAP`].
pub fn derive_note_row(note: &AdminNote, date: Option<NaiveDate>) -> RawRow {
    let mut row = RawRow::with_capacity(TUP_NOTE_FIELD_MAP.len() + 1);
    row.insert(
        C_FIELD_DATE,
        date.map_or(CellValue::Empty, |d| CellValue::Text(format_iso_date(d))),
    );
    for (field_note, field_sheet) in TUP_NOTE_FIELD_MAP {
        row.insert(field_sheet, note.field_value(field_note));
    }
    row
}

/// Emit one row per calendar day in `window` whose weekday matches each
/// note's tag, in note order then ascending date.
///
/// Notes without a tag are skipped; unknown tags and inverted windows yield
/// nothing.
pub fn expand(notes: &[AdminNote], window: &RecurrenceWindow) -> Vec<RawRow> {
    notes
        .iter()
        .filter_map(|note| note.weekday_tag().and_then(parse_weekday_tag).map(|wd| (note, wd)))
        .flat_map(|(note, weekday)| expand_note(note, weekday, window))
        .collect()
}

fn expand_note(note: &AdminNote, weekday: Weekday, window: &RecurrenceWindow) -> Vec<RawRow> {
    if window.is_empty() {
        return vec![];
    }
    window
        .date_min
        .iter_days()
        .take_while(|date| *date <= window.date_max)
        .filter(|date| date.weekday() == weekday)
        .map(|date| derive_note_row(note, Some(date)))
        .collect()
}

/// Rows contributed by all notes, in note order.
///
/// A recurring note contributes its occurrences, a dated note one row, a note
/// with neither one undated row. A tagged note drives by its tag even when it
/// also carries a date.
///
/// `n_days_window_max` bounds the window only when some note actually
/// recurs; otherwise the window is never walked.
pub(crate) fn collect_note_rows(
    notes: &[AdminNote],
    window: &RecurrenceWindow,
    n_days_window_max: Option<usize>,
    builder: &mut ReportPipelineBuilder,
) -> Result<Vec<RawRow>, PipelineError> {
    let if_any_recurring = notes
        .iter()
        .filter_map(AdminNote::weekday_tag)
        .any(|tag| parse_weekday_tag(tag).is_some());
    if if_any_recurring
        && let Some(n_days_max) = n_days_window_max
        && window.n_days() > n_days_max
    {
        return Err(PipelineError::Expand(format!(
            "recurrence window {}..={} spans {} days (max {n_days_max})",
            window.date_min,
            window.date_max,
            window.n_days()
        )));
    }

    let mut l_rows = Vec::new();
    for (n_idx, note) in notes.iter().enumerate() {
        builder.add_note();
        let label = note.id.map_or_else(|| format!("#{n_idx}"), |id| format!("id={id}"));

        let Some(tag) = note.weekday_tag() else {
            l_rows.push(derive_note_row(note, note.date));
            continue;
        };

        let Some(weekday) = parse_weekday_tag(tag) else {
            builder.add_warning(format!(
                "note {label}: unknown weekday tag {tag:?}; no occurrences generated"
            ));
            continue;
        };

        if note.date.is_some() {
            builder.add_warning(format!(
                "note {label}: carries both a date and weekday {tag:?}; expanding by weekday"
            ));
        }

        let l_occurrences = expand_note(note, weekday, window);
        builder.add_recurring_note(l_occurrences.len());
        l_rows.extend(l_occurrences);
    }
    Ok(l_rows)
}
