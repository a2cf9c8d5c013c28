//! Advisory cross-form consistency checks.
//!
//! These never block loading and never raise: each finding is a
//! human-readable issue string for the review team.

use polars::prelude::DataFrame;

use sdv_ingest::{WideTable, column_value_string, find_column_containing, string_column};
use sdv_model::is_real_value;

use crate::datetime::parse_date;

/// Follow-up visit prefixes checked against the procedure date.
const FOLLOW_UP_PREFIXES: [&str; 8] = [
    "FU1M", "FU3M", "FU6M", "FU1Y", "FU2Y", "FU3Y", "FU4Y", "FU5Y",
];

/// Runs every cross-form check. Returns an empty list when the data is
/// consistent.
pub fn validate_cross_form(wide: &WideTable, ae_sheet: Option<&DataFrame>) -> Vec<String> {
    let mut issues = Vec::new();
    check_fatal_ae_death_consistency(wide, ae_sheet, &mut issues);
    check_procedure_before_followups(wide, &mut issues);
    check_ae_onset_after_procedure(wide, ae_sheet, &mut issues);
    if !issues.is_empty() {
        tracing::info!(count = issues.len(), "cross-form validation found issues");
    }
    issues
}

/// An AE with outcome "Fatal" should have a matching Death-form date.
fn check_fatal_ae_death_consistency(
    wide: &WideTable,
    ae_sheet: Option<&DataFrame>,
    issues: &mut Vec<String>,
) {
    let Some(ae) = ae_sheet else { return };
    let Some(outcome_col) = find_column_containing(ae, "AEOUT") else {
        return;
    };
    let death_date_col = wide
        .column_names()
        .into_iter()
        .find(|name| name.contains("DTH_DDDTC"));

    let outcomes = string_column(ae, outcome_col);
    let patients = string_column(ae, "Screening #");
    let mut seen = std::collections::BTreeSet::new();
    for (patient, outcome) in patients.iter().zip(&outcomes) {
        if !outcome.eq_ignore_ascii_case("fatal") || !seen.insert(patient.clone()) {
            continue;
        }
        let Some(death_col) = &death_date_col else {
            issues.push(format!("{patient}: Fatal AE but no Death form column found in data"));
            continue;
        };
        let Some(row) = wide.row_for_patient(patient) else {
            continue;
        };
        let death_value = wide.value(row, death_col);
        if !is_real_value(&death_value) {
            issues.push(format!("{patient}: Fatal AE outcome but Death form date is empty"));
        }
    }
}

/// The procedure date should precede every follow-up visit date.
fn check_procedure_before_followups(wide: &WideTable, issues: &mut Vec<String>) {
    let columns = wide.column_names();
    let Some(proc_col) = columns.iter().find(|name| name.contains("TV_PR_PRSTDTC")) else {
        return;
    };
    let visit_cols: Vec<(&str, &String)> = FOLLOW_UP_PREFIXES
        .iter()
        .filter_map(|prefix| {
            columns
                .iter()
                .find(|name| name.contains(&format!("{prefix}_SV_SVSTDTC")))
                .map(|column| (*prefix, column))
        })
        .collect();
    if visit_cols.is_empty() {
        return;
    }

    for patient in wide.patients() {
        let Some(row) = wide.row_for_patient(&patient) else {
            continue;
        };
        let Some(proc_date) = parse_date(&wide.value(row, proc_col)) else {
            continue;
        };
        for (prefix, column) in &visit_cols {
            if let Some(visit_date) = parse_date(&wide.value(row, column.as_str())) {
                if visit_date < proc_date {
                    issues.push(format!(
                        "{patient}: {prefix} visit date ({visit_date}) precedes procedure date ({proc_date})"
                    ));
                }
            }
        }
    }
}

/// A post-procedure AE should not start before the procedure date. AEs
/// explicitly marked pre-procedure are skipped.
fn check_ae_onset_after_procedure(
    wide: &WideTable,
    ae_sheet: Option<&DataFrame>,
    issues: &mut Vec<String>,
) {
    let Some(ae) = ae_sheet else { return };
    let columns = wide.column_names();
    let Some(proc_col) = columns.iter().find(|name| name.contains("TV_PR_PRSTDTC")) else {
        return;
    };
    let Some(onset_col) = find_column_containing(ae, "AESTDTC") else {
        return;
    };
    let interval_col = find_column_containing(ae, "AEINT");
    let term_col = find_column_containing(ae, "AETERM");

    for idx in 0..ae.height() {
        let patient = column_value_string(ae, "Screening #", idx).trim().to_string();
        let Some(row) = wide.row_for_patient(&patient) else {
            continue;
        };
        let Some(proc_date) = parse_date(&wide.value(row, proc_col)) else {
            continue;
        };
        if let Some(interval_col) = interval_col {
            let interval = column_value_string(ae, interval_col, idx).to_lowercase();
            if interval.contains("pre") {
                continue;
            }
        }
        let Some(onset) = parse_date(&column_value_string(ae, onset_col, idx)) else {
            continue;
        };
        if onset < proc_date {
            let term = term_col
                .map(|column| column_value_string(ae, column, idx))
                .unwrap_or_default();
            let term: String = term.chars().take(40).collect();
            issues.push(format!(
                "{patient}: AE '{term}' onset ({onset}) before procedure ({proc_date}) but not marked pre-procedure"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::Column;

    use super::*;

    fn wide() -> WideTable {
        WideTable::new(
            DataFrame::new(vec![
                Column::new("Screening #".into(), ["101-01", "101-02"]),
                Column::new("Site #".into(), ["101", "101"]),
                Column::new("Status".into(), ["Enrolled", "Enrolled"]),
                Column::new("TV_PR_PRSTDTC".into(), ["2025-02-01", "2025-02-10"]),
                Column::new("FU1M_SV_SVSTDTC".into(), ["2025-03-01", "2025-02-05"]),
                Column::new("LOGS_DTH_DDDTC".into(), ["", ""]),
            ])
            .expect("frame"),
        )
        .expect("wide")
    }

    fn ae_sheet() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Screening #".into(), ["101-01"]),
            Column::new("LOGS_AE_AETERM".into(), ["Cardiac arrest"]),
            Column::new("LOGS_AE_AEOUT".into(), ["Fatal"]),
            Column::new("LOGS_AE_AESTDTC".into(), ["2025-01-20"]),
            Column::new("LOGS_AE_AEINT".into(), [""]),
        ])
        .expect("frame")
    }

    #[test]
    fn fatal_ae_without_death_date_is_flagged() {
        let issues = validate_cross_form(&wide(), Some(&ae_sheet()));
        assert!(
            issues
                .iter()
                .any(|issue| issue.contains("Death form date is empty")),
            "{issues:?}"
        );
    }

    #[test]
    fn followup_before_procedure_is_flagged() {
        let issues = validate_cross_form(&wide(), None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with("101-02: FU1M"));
    }

    #[test]
    fn pre_procedure_onset_is_flagged_unless_marked() {
        let issues = validate_cross_form(&wide(), Some(&ae_sheet()));
        assert!(
            issues
                .iter()
                .any(|issue| issue.contains("before procedure")),
            "{issues:?}"
        );

        let marked = DataFrame::new(vec![
            Column::new("Screening #".into(), ["101-01"]),
            Column::new("LOGS_AE_AETERM".into(), ["Cardiac arrest"]),
            Column::new("LOGS_AE_AEOUT".into(), ["Recovered"]),
            Column::new("LOGS_AE_AESTDTC".into(), ["2025-01-20"]),
            Column::new("LOGS_AE_AEINT".into(), ["Pre-procedure"]),
        ])
        .expect("frame");
        let issues = validate_cross_form(&wide(), Some(&marked));
        assert!(!issues.iter().any(|issue| issue.contains("before procedure")));
    }
}
