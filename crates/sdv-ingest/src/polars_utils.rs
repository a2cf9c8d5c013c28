//! Polars `AnyValue` helpers shared by every table wrapper.
//!
//! Clinical exports are string-typed end to end, but cells that passed
//! through a spreadsheet tool arrive as floats ("3.0" repeat numbers) or
//! nulls, so every read goes through these conversions.

use polars::prelude::{AnyValue, DataFrame};

use sdv_model::is_real_value;

/// Converts a Polars AnyValue to a String representation.
/// Returns empty string for Null, formats numerics without trailing zeros.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(v) => v.to_string(),
        AnyValue::StringOwned(v) => v.to_string(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::Boolean(v) => if v { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

/// Formats a floating-point number without unnecessary trailing zeros.
pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Converts an AnyValue to i64, returning None for non-numeric or null.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(i64::from(v)),
        AnyValue::Int16(v) => Some(i64::from(v)),
        AnyValue::Int32(v) => Some(i64::from(v)),
        AnyValue::Int64(v) => Some(v),
        AnyValue::UInt8(v) => Some(i64::from(v)),
        AnyValue::UInt16(v) => Some(i64::from(v)),
        AnyValue::UInt32(v) => Some(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::Float32(v) => Some(v as i64),
        AnyValue::Float64(v) => Some(v as i64),
        AnyValue::String(v) => parse_i64(v),
        AnyValue::StringOwned(v) => parse_i64(&v),
        _ => None,
    }
}

/// Parses a string as i64, tolerating a trailing `.0` float artifact.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Some(parsed);
    }
    trimmed.parse::<f64>().ok().map(|v| v as i64)
}

pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// String value of a cell, empty when the column or row is absent.
pub fn column_value_string(df: &DataFrame, name: &str, idx: usize) -> String {
    match df.column(name) {
        Ok(column) => any_to_string(column.get(idx).unwrap_or(AnyValue::Null)),
        Err(_) => String::new(),
    }
}

/// Entire column as trimmed strings; empty strings when the column is absent.
pub fn string_column(df: &DataFrame, name: &str) -> Vec<String> {
    match df.column(name) {
        Ok(column) => (0..df.height())
            .map(|idx| {
                any_to_string(column.get(idx).unwrap_or(AnyValue::Null))
                    .trim()
                    .to_string()
            })
            .collect(),
        Err(_) => vec![String::new(); df.height()],
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// First column whose name contains `needle`, in schema order.
pub fn find_column_containing<'a>(df: &'a DataFrame, needle: &str) -> Option<&'a str> {
    df.get_column_names()
        .into_iter()
        .map(polars::prelude::PlSmallStr::as_str)
        .find(|name| name.contains(needle))
}

/// Strips the `.0` suffix Excel round-tripping adds to numeric identifiers.
pub fn clean_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix(".0")
        .unwrap_or(trimmed)
        .to_string()
}

/// True when a cell holds actual data (non-empty, not a null sentinel).
pub fn cell_has_value(df: &DataFrame, name: &str, idx: usize) -> bool {
    is_real_value(&column_value_string(df, name, idx))
}

#[cfg(test)]
mod tests {
    use polars::prelude::{Column, DataFrame};

    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Screening #".into(), ["101-01", "101-02"]),
            Column::new("Value".into(), ["72", ""]),
        ])
        .expect("frame")
    }

    #[test]
    fn missing_column_reads_as_empty() {
        let df = frame();
        assert_eq!(column_value_string(&df, "Nope", 0), "");
        assert_eq!(string_column(&df, "Nope"), vec!["", ""]);
    }

    #[test]
    fn identifier_cleanup_strips_float_suffix() {
        assert_eq!(clean_identifier(" 206.0 "), "206");
        assert_eq!(clean_identifier("206-06"), "206-06");
    }

    #[test]
    fn repeat_numbers_parse_through_float_artifacts() {
        assert_eq!(parse_i64("3.0"), Some(3));
        assert_eq!(parse_i64(""), None);
        assert_eq!(parse_i64("x"), None);
    }

    #[test]
    fn cell_has_value_honors_sentinels() {
        let df = DataFrame::new(vec![Column::new("V".into(), ["nan", "72"])]).expect("frame");
        assert!(!cell_has_value(&df, "V", 0));
        assert!(cell_has_value(&df, "V", 1));
    }
}
