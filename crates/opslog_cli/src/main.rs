use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use opslog_io_xlsx::{
    CalamineWorkbookParser, SpecExportOptions, SpecXlsxReadOptions, export_dataset_to_xlsx,
};
use opslog_merge::{
    AdminNote, N_MONTHS_WINDOW_DEFAULT, PipelineWorker, RecurrenceWindow, SanitizerDefault,
    SpecPipelineOptions, SpecPipelineRequest,
};

#[derive(Debug, Parser)]
#[command(
    name = "opslog",
    about = "Merge an ops log workbook and admin notes into one dated table",
    long_about = "Read every sheet of an incident/maintenance workbook, expand weekly admin notes over a date window, \
                  reconcile columns and sort rows by date. The merged table is printed as JSON and can be exported to XLSX.",
    after_help = "Run summaries go to stderr at info level; RUST_LOG overrides (e.g. RUST_LOG=opslog_merge=debug)."
)]
struct OpslogCli {
    #[arg(long, value_name = "PATH", help = "Workbook to read (xlsx/xls/ods)")]
    workbook: PathBuf,
    #[arg(long, value_name = "PATH", help = "Admin notes as a JSON array")]
    notes: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Pipeline options as JSON")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "YYYY-MM-DD", help = "First day of the recurrence window")]
    from: Option<NaiveDate>,
    #[arg(long, value_name = "YYYY-MM-DD", help = "Last day of the recurrence window")]
    to: Option<NaiveDate>,
    #[arg(
        long = "skip-rows",
        default_value_t = opslog_io_xlsx::N_ROWS_HEADER_SKIP,
        help = "Banner rows above each sheet's header row"
    )]
    skip_rows: usize,
    #[arg(long = "json-out", value_name = "PATH", help = "Write the dataset JSON here instead of stdout")]
    json_out: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Also export the dataset to this XLSX file")]
    export: Option<PathBuf>,
}

const C_LOG_FILTER_DEFAULT: &str = "info";

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(derive_log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = OpslogCli::parse();
    run(cli)
}

fn run(cli: OpslogCli) -> Result<()> {
    let options = load_options(cli.config.as_ref())?;
    let notes = load_notes(cli.notes.as_ref())?;
    let window = derive_window(cli.from, cli.to);
    let workbook_bytes = fs::read(&cli.workbook)
        .with_context(|| format!("failed to read workbook {}", cli.workbook.display()))?;

    let parser = CalamineWorkbookParser::new(SpecXlsxReadOptions {
        n_rows_skip: cli.skip_rows,
        ..SpecXlsxReadOptions::default()
    });
    let worker = PipelineWorker::spawn(
        Arc::new(parser),
        Arc::new(SanitizerDefault::default()),
        options,
    );
    let output = worker
        .run(SpecPipelineRequest {
            workbook_bytes,
            notes,
            window,
        })
        .with_context(|| format!("pipeline failed for {}", cli.workbook.display()))?;

    tracing::info!(
        target: "opslog",
        workbook = %cli.workbook.display(),
        rows = output.dataset.len(),
        cols = output.dataset.columns().len(),
        warnings = output.report.warning_count(),
        "dataset ready"
    );

    let c_json = serde_json::to_string_pretty(&output.dataset)?;
    match cli.json_out.as_ref() {
        Some(path) => fs::write(path, c_json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{c_json}"),
    }

    if let Some(path) = cli.export.as_ref() {
        let report = export_dataset_to_xlsx(&output.dataset, path, &SpecExportOptions::default())
            .with_context(|| format!("export to {} failed", path.display()))?;
        tracing::info!(
            target: "opslog",
            rows = report.n_rows_written(),
            sheets = report.sheets.len(),
            file = %path.display(),
            "dataset exported"
        );
    }
    Ok(())
}

fn load_options(path: Option<&PathBuf>) -> Result<SpecPipelineOptions> {
    let Some(path) = path else {
        return Ok(SpecPipelineOptions::default());
    };
    let c_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read options {}", path.display()))?;
    serde_json::from_str(&c_text).with_context(|| format!("invalid options in {}", path.display()))
}

fn load_notes(path: Option<&PathBuf>) -> Result<Vec<AdminNote>> {
    let Some(path) = path else {
        return Ok(vec![]);
    };
    let c_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read notes {}", path.display()))?;
    serde_json::from_str(&c_text).with_context(|| format!("invalid notes in {}", path.display()))
}

/// Log filter from `RUST_LOG`, falling back to info-level output.
fn derive_log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::new(
        directives
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(C_LOG_FILTER_DEFAULT),
    )
}

fn derive_window(from: Option<NaiveDate>, to: Option<NaiveDate>) -> RecurrenceWindow {
    let window_default = RecurrenceWindow::around(Local::now().date_naive(), N_MONTHS_WINDOW_DEFAULT);
    RecurrenceWindow::new(
        from.unwrap_or(window_default.date_min),
        to.unwrap_or(window_default.date_max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn explicit_bounds_win_over_default_window() {
        let window = derive_window(Some(ymd(2024, 1, 1)), Some(ymd(2024, 1, 14)));
        assert_eq!(window, RecurrenceWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 14)));

        let window = derive_window(Some(ymd(2024, 1, 1)), None);
        assert_eq!(window.date_min, ymd(2024, 1, 1));
    }

    #[test]
    fn default_window_spans_both_sides_of_today() {
        let today = Local::now().date_naive();
        let window = derive_window(None, None);
        assert!(window.contains(today));
        assert!(window.n_days() >= 56);
    }

    #[test]
    fn log_filter_defaults_to_info_and_honours_rust_log() {
        assert_eq!(derive_log_filter(None).to_string(), "info");
        assert_eq!(derive_log_filter(Some("  ")).to_string(), "info");
        assert!(
            derive_log_filter(Some("opslog_merge=debug"))
                .to_string()
                .contains("opslog_merge=debug")
        );
    }

    #[test]
    fn cli_parses_window_and_outputs() {
        let cli = OpslogCli::try_parse_from([
            "opslog",
            "--workbook",
            "log.xlsx",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
            "--export",
            "out.xlsx",
        ])
        .expect("parse");
        assert_eq!(cli.from, Some(ymd(2024, 1, 1)));
        assert_eq!(cli.skip_rows, opslog_io_xlsx::N_ROWS_HEADER_SKIP);
        assert_eq!(cli.export, Some(PathBuf::from("out.xlsx")));
        assert!(cli.notes.is_none());
    }
}
