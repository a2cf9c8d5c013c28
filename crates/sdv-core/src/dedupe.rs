//! Overflow-row deduplication for repeating-form sheets.
//!
//! Exports write one physical row per logical record, then continuation
//! rows when free text overflows a cell. Continuations share the group
//! key (patient + record number) but carry fewer populated cells, so the
//! most informationally complete row represents the record.

use std::collections::BTreeMap;

use anyhow::Result;
use polars::prelude::{BooleanChunked, DataFrame, NewChunkedArray};
use tracing::debug;

use sdv_ingest::column_value_string;
use sdv_model::is_real_value;

/// Row score used to pick the surviving row of a duplicate group: a
/// non-empty term field dominates, then the count of non-empty cells.
/// Earlier rows win ties, which makes the choice stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RowScore {
    has_term: bool,
    populated: usize,
}

fn score_row(df: &DataFrame, idx: usize, term_column: Option<&str>) -> RowScore {
    let mut populated = 0usize;
    for column in df.get_columns() {
        let value = sdv_ingest::any_to_string(column.get(idx).unwrap_or(polars::prelude::AnyValue::Null));
        if !value.trim().is_empty() {
            populated += 1;
        }
    }
    let has_term = term_column
        .map(|name| is_real_value(&column_value_string(df, name, idx)))
        .unwrap_or(false);
    RowScore {
        has_term,
        populated,
    }
}

/// Collapses duplicate rows per group key, keeping the best-scoring row.
///
/// Rows whose group key is entirely blank are always kept. Running the
/// pass twice removes nothing further (idempotent).
pub fn dedupe_repeating_rows(
    df: &DataFrame,
    group_keys: &[&str],
    term_column: Option<&str>,
) -> Result<DataFrame> {
    let height = df.height();
    if height == 0 || group_keys.is_empty() {
        return Ok(df.clone());
    }

    // Winner per composite key: (row index, score).
    let mut winners: BTreeMap<String, (usize, RowScore)> = BTreeMap::new();
    let mut keys = Vec::with_capacity(height);
    for idx in 0..height {
        let mut composite = String::new();
        for (pos, name) in group_keys.iter().enumerate() {
            if pos > 0 {
                composite.push('|');
            }
            composite.push_str(column_value_string(df, name, idx).trim());
        }
        let blank = composite.split('|').all(str::is_empty);
        keys.push((composite.clone(), blank));
        if blank {
            continue;
        }
        let score = score_row(df, idx, term_column);
        match winners.get(&composite) {
            Some((_, best)) if *best >= score => {}
            _ => {
                winners.insert(composite, (idx, score));
            }
        }
    }

    let keep: Vec<bool> = keys
        .iter()
        .enumerate()
        .map(|(idx, (key, blank))| {
            *blank || winners.get(key).is_some_and(|(winner, _)| *winner == idx)
        })
        .collect();

    let removed = keep.iter().filter(|flag| !**flag).count();
    if removed > 0 {
        debug!(rows = height, removed, "collapsed overflow rows");
    }

    let mask = BooleanChunked::from_slice("dedupe".into(), &keep);
    Ok(df.filter(&mask)?)
}

#[cfg(test)]
mod tests {
    use polars::prelude::Column;

    use super::*;

    fn ae_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Screening #".into(), ["101-01", "101-01", "101-01", "101-02"]),
            Column::new("AE #".into(), ["1", "1", "2", "1"]),
            Column::new(
                "LOGS_AE_AETERM".into(),
                ["Dyspnea", "", "Edema", "Fall"],
            ),
            Column::new(
                "LOGS_AE_AETERM_COMM".into(),
                ["short", "a much longer continuation of the description", "", ""],
            ),
        ])
        .expect("frame")
    }

    #[test]
    fn keeps_row_with_term_over_fuller_continuation() {
        let df = ae_frame();
        let out =
            dedupe_repeating_rows(&df, &["Screening #", "AE #"], Some("LOGS_AE_AETERM")).expect("dedupe");
        assert_eq!(out.height(), 3);
        // The continuation row had more text but no term; the term row wins.
        assert_eq!(column_value_string(&out, "LOGS_AE_AETERM", 0), "Dyspnea");
    }

    #[test]
    fn dedupe_is_idempotent() {
        let df = ae_frame();
        let once =
            dedupe_repeating_rows(&df, &["Screening #", "AE #"], Some("LOGS_AE_AETERM")).expect("first");
        let twice = dedupe_repeating_rows(&once, &["Screening #", "AE #"], Some("LOGS_AE_AETERM"))
            .expect("second");
        assert_eq!(once.height(), twice.height());
        assert!(once.equals(&twice));
    }

    #[test]
    fn blank_keys_are_never_collapsed() {
        let df = DataFrame::new(vec![
            Column::new("Screening #".into(), ["", ""]),
            Column::new("AE #".into(), ["", ""]),
            Column::new("X".into(), ["a", "b"]),
        ])
        .expect("frame");
        let out = dedupe_repeating_rows(&df, &["Screening #", "AE #"], None).expect("dedupe");
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn first_row_wins_score_ties() {
        let df = DataFrame::new(vec![
            Column::new("Screening #".into(), ["101-01", "101-01"]),
            Column::new("AE #".into(), ["1", "1"]),
            Column::new("V".into(), ["first", "second"]),
        ])
        .expect("frame");
        let out = dedupe_repeating_rows(&df, &["Screening #", "AE #"], None).expect("dedupe");
        assert_eq!(out.height(), 1);
        assert_eq!(column_value_string(&out, "V", 0), "first");
    }
}
