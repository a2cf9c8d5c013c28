//! Header-row location for exports that carry metadata rows above the
//! real column names.
//!
//! The status-history export in particular prepends a variable number of
//! banner/metadata rows. The loader collaborator hands the sheet over as
//! a headerless frame of string cells; scanning for a row that contains
//! enough of the expected column names recovers the true header.

use anyhow::Result;
use polars::prelude::{Column, DataFrame};
use tracing::warn;

use crate::polars_utils::any_to_string;

/// Number of leading rows scanned for a header before giving up.
pub const HEADER_SCAN_LIMIT: usize = 50;

/// Minimum expected-name hits for a row to qualify as the header.
const MIN_HEADER_MATCHES: usize = 2;

/// Locates the header row by scanning the first [`HEADER_SCAN_LIMIT`]
/// rows for one containing at least two of `expected`.
///
/// Falls back to row 0 with a warning when no row qualifies; a wrong
/// guess surfaces later as missing identity columns, which is a louder
/// and more descriptive failure than parsing garbage silently.
pub fn locate_header_row(df: &DataFrame, expected: &[&str]) -> usize {
    let limit = df.height().min(HEADER_SCAN_LIMIT);
    for idx in 0..limit {
        let mut matches = 0usize;
        for column in df.get_columns() {
            let cell = any_to_string(column.get(idx).unwrap_or(polars::prelude::AnyValue::Null));
            let cell = cell.trim();
            if expected.iter().any(|name| *name == cell) {
                matches += 1;
                if matches >= MIN_HEADER_MATCHES {
                    return idx;
                }
            }
        }
    }
    warn!(
        scanned = limit,
        "could not identify header row, falling back to row 0"
    );
    0
}

/// Rebuilds `df` using row `header_idx` as the column names and the rows
/// below it as data. Blank or duplicate header cells get positional
/// fallback names so the frame stays addressable.
pub fn apply_header_row(df: &DataFrame, header_idx: usize) -> Result<DataFrame> {
    let height = df.height();
    let data_start = header_idx + 1;
    let mut names: Vec<String> = Vec::with_capacity(df.width());
    for (pos, column) in df.get_columns().iter().enumerate() {
        let raw = any_to_string(
            column
                .get(header_idx)
                .unwrap_or(polars::prelude::AnyValue::Null),
        );
        let name = raw.replace('\u{a0}', " ").trim().to_string();
        let mut name = if name.is_empty() {
            format!("column_{pos}")
        } else {
            name
        };
        while names.contains(&name) {
            name.push('_');
        }
        names.push(name);
    }

    let mut columns = Vec::with_capacity(df.width());
    for (pos, column) in df.get_columns().iter().enumerate() {
        let values: Vec<String> = (data_start..height)
            .map(|idx| any_to_string(column.get(idx).unwrap_or(polars::prelude::AnyValue::Null)))
            .collect();
        columns.push(Column::new(names[pos].as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}
