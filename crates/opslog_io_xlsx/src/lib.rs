//! `opslog_io_xlsx` v1:
//! Spreadsheet collaborators of the ops log pipeline.
//!
//! Architecture:
//! - `conf`   : constants and default presets
//! - `spec`   : specs/models/options/errors
//! - `util`   : pure helper functions
//! - `reader` : calamine workbook reader (pipeline input)
//! - `writer` : pure-Rust writer kernel
//! - `export` : canonical dataset -> export sheet
pub mod conf;
pub mod export;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, N_ROWS_HEADER_SKIP,
    TUP_EXCEL_ILLEGAL, TUP_EXPORT_COLUMNS, derive_default_xlsx_styles,
};
pub use export::{derive_export_table, export_dataset_to_buffer, export_dataset_to_xlsx};
pub use reader::{CalamineWorkbookParser, read_workbook_bytes};
pub use spec::{
    EnumCellAlign, EnumColumnWidthRule, EnumXlsxCell, ExportError, SpecCellStyle,
    SpecColumnWidthPolicy, SpecExportOptions, SpecSheetSlice, SpecXlsxReadOptions,
    SpecXlsxReport, SpecXlsxStylePresets, SpecXlsxWriteOptions,
};
pub use util::{derive_unique_headers, plan_sheet_slices, sanitize_sheet_name};
pub use writer::{SpecXlsxSheetWriteOptions, XlsxWriter};
