//! Export of a canonical dataset to a single XLSX sheet.
//!
//! The export consumes the pipeline's [`CanonicalDataset`] as-is: same rows,
//! same order, restricted to [`TUP_EXPORT_COLUMNS`] under display names.

use std::path::Path;

use opslog_merge::CanonicalDataset;
use polars::prelude::{Column, DataFrame, NamedFrom, Series};

use crate::conf::{TUP_EXPORT_COLUMNS, TUP_EXPORT_DURATION_COLUMNS};
use crate::spec::{ExportError, SpecExportOptions, SpecXlsxReport, SpecXlsxWriteOptions};
use crate::writer::{SpecXlsxSheetWriteOptions, XlsxWriter};

/// Build the export table: one text column per export column, display names
/// as headers, dataset row order kept.
///
/// Columns absent from the dataset export as empty. An empty dataset is
/// [`ExportError::NoTable`].
pub fn derive_export_table(dataset: &CanonicalDataset) -> Result<DataFrame, ExportError> {
    if dataset.is_empty() {
        return Err(ExportError::NoTable);
    }

    let l_columns: Vec<Column> = TUP_EXPORT_COLUMNS
        .iter()
        .map(|(field, display)| {
            let l_values: Vec<&str> = dataset.column_values(field).collect();
            Column::from(Series::new((*display).into(), l_values))
        })
        .collect();

    DataFrame::new(l_columns).map_err(|err| ExportError::Table(err.to_string()))
}

fn derive_sheet_write_options(options: &SpecExportOptions) -> SpecXlsxSheetWriteOptions {
    let cols_numeric = TUP_EXPORT_COLUMNS
        .iter()
        .filter(|(field, _)| TUP_EXPORT_DURATION_COLUMNS.contains(field))
        .map(|(_, display)| display.to_string())
        .collect();

    SpecXlsxSheetWriteOptions {
        cols_numeric,
        n_cols_frozen: options.n_cols_frozen,
        policy_width: options.policy_width.clone(),
    }
}

fn write_export_sheet(
    writer: &mut XlsxWriter,
    dataset: &CanonicalDataset,
    options: &SpecExportOptions,
) -> Result<SpecXlsxReport, ExportError> {
    let df_export = derive_export_table(dataset)?;
    let report = writer
        .write_sheet(
            &df_export,
            &options.sheet_name,
            &derive_sheet_write_options(options),
        )
        .map_err(ExportError::Write)?;
    tracing::info!(
        target: "opslog_io_xlsx",
        rows = report.n_rows_written(),
        sheets = report.sheets.len(),
        "dataset exported"
    );
    Ok(report)
}

/// Export `dataset` to an XLSX file at `path`.
pub fn export_dataset_to_xlsx(
    dataset: &CanonicalDataset,
    path: impl AsRef<Path>,
    options: &SpecExportOptions,
) -> Result<SpecXlsxReport, ExportError> {
    let mut writer = XlsxWriter::new(path.as_ref(), SpecXlsxWriteOptions::default());
    let report = write_export_sheet(&mut writer, dataset, options)?;
    writer.close().map_err(ExportError::Write)?;
    Ok(report)
}

/// Export `dataset` to in-memory XLSX bytes.
pub fn export_dataset_to_buffer(
    dataset: &CanonicalDataset,
    options: &SpecExportOptions,
) -> Result<(Vec<u8>, SpecXlsxReport), ExportError> {
    let mut writer = XlsxWriter::in_memory(SpecXlsxWriteOptions::default());
    let report = write_export_sheet(&mut writer, dataset, options)?;
    let v_bytes = writer.save_to_buffer().map_err(ExportError::Write)?;
    Ok((v_bytes, report))
}
