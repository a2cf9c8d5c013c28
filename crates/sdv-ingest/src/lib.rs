pub mod header;
pub mod labels;
pub mod polars_utils;
pub mod tables;

pub use header::{HEADER_SCAN_LIMIT, apply_header_row, locate_header_row};
pub use labels::{LabelDictionary, clean_label};
pub use polars_utils::{
    any_to_i64, any_to_string, cell_has_value, clean_identifier, column_value_string,
    find_column_containing, format_numeric, has_column, parse_f64, parse_i64, string_column,
};
pub use tables::{
    HISTORY_HEADER_HINTS, HistoryRow, MODULAR_REQUIRED_COLUMNS, ModularTable, StatusHistoryTable,
    WIDE_IDENTITY_COLUMNS, WideTable, normalize_repeat,
};
