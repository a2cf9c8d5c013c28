//! AE filtering scenarios over a small synthetic export.

use polars::prelude::{Column, DataFrame};

use sdv_ingest::WideTable;
use sdv_report::{AeFilters, AeManager};

fn wide() -> WideTable {
    WideTable::new(
        DataFrame::new(vec![
            Column::new("Screening #".into(), ["101-01", "101-02", "102-01"]),
            Column::new("Site #".into(), ["101", "101", "102"]),
            Column::new(
                "Status".into(),
                ["Enrolled", "Screen Failure", "Enrolled"],
            ),
            Column::new(
                "TV_PR_PRSTDTC".into(),
                ["2025-03-01", "", "2025-03-05"],
            ),
        ])
        .expect("frame"),
    )
    .expect("wide")
}

fn ae_sheet() -> DataFrame {
    DataFrame::new(vec![
        Column::new(
            "Screening #".into(),
            ["101-01", "101-01", "101-02", "102-01"],
        ),
        Column::new("Template number".into(), ["1", "2", "1", "1"]),
        Column::new(
            "LOGS_AE_AETERM".into(),
            ["Dyspnea", "Fall", "Nausea", "Edema"],
        ),
        Column::new("LOGS_AE_AESER".into(), ["Yes", "No", "No", "No"]),
        Column::new(
            "LOGS_AE_AESTDTC".into(),
            ["2025-03-10", "2025-03-20", "2025-03-12", "2025-02-20"],
        ),
        Column::new("LOGS_AE_AEENDTC".into(), ["", "2025-03-25", "", ""]),
        Column::new("LOGS_AE_AEONGO".into(), ["", "", "", ""]),
        Column::new(
            "LOGS_AE_AEOUT".into(),
            ["Not Recovered", "Recovered", "Recovered", "Not Recovered"],
        ),
        Column::new(
            "LOGS_AE_AEREL1".into(),
            ["Not Related", "Not Related", "Not Related", "Not Related"],
        ),
        Column::new(
            "LOGS_AE_AEREL2".into(),
            ["Possibly Related", "Not Related", "Not Related", "Not Related"],
        ),
        Column::new(
            "LOGS_AE_AEREL3".into(),
            ["Not Related", "Not Related", "Not Related", "Not Related"],
        ),
        Column::new(
            "LOGS_AE_AEREL4".into(),
            ["Not Related", "Not Related", "Not Related", "Related"],
        ),
        Column::new("LOGS_AE_AEREPDAT".into(), ["2025-03-11", "2025-03-21", "", ""]),
    ])
    .expect("frame")
}

fn manager() -> AeManager {
    AeManager::new(wide(), Some(ae_sheet())).expect("manager")
}

#[test]
fn onset_cutoff_keeps_only_later_events() {
    let manager = manager();
    let filters = AeFilters {
        onset_cutoff: Some("2025-03-15".to_string()),
        ..AeFilters::default()
    };
    let records = manager.patient_records("101-01", &filters);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].term, "Fall");
}

#[test]
fn unparseable_cutoff_disables_the_filter() {
    let manager = manager();
    let filters = AeFilters {
        onset_cutoff: Some("mid-march".to_string()),
        ..AeFilters::default()
    };
    let records = manager.patient_records("101-01", &filters);
    assert_eq!(records.len(), 2);
}

#[test]
fn device_related_filter_uses_all_four_axes() {
    let manager = manager();
    let filters = AeFilters {
        device_related_only: true,
        ..AeFilters::default()
    };
    // 101-01 #1 is Possibly Related on the delivery-system axis.
    let included = manager.patient_records("101-01", &filters);
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].term, "Dyspnea");
    // 101-02's only AE is Not Related on every axis.
    let excluded = manager.patient_records("101-02", &filters);
    assert!(excluded.is_empty());
    // 102-01 is Related on the index-procedure axis.
    let procedure = manager.patient_records("102-01", &filters);
    assert_eq!(procedure.len(), 1);
}

#[test]
fn sae_only_filter() {
    let manager = manager();
    let filters = AeFilters {
        sae_only: true,
        ..AeFilters::default()
    };
    let records = manager.patient_records("101-01", &filters);
    assert_eq!(records.len(), 1);
    assert!(records[0].is_sae());
}

#[test]
fn pre_procedure_events_are_dropped_when_requested() {
    let manager = manager();
    let filters = AeFilters {
        exclude_pre_proc: true,
        ..AeFilters::default()
    };
    // 102-01's AE started 2025-02-20, before its 2025-03-05 procedure.
    let records = manager.patient_records("102-01", &filters);
    assert!(records.is_empty());
    // Patients without a procedure date keep their events.
    let kept = manager.patient_records("101-02", &filters);
    assert_eq!(kept.len(), 1);
}

#[test]
fn report_cutoff_excludes_missing_dates() {
    let manager = manager();
    let filters = AeFilters {
        report_cutoff: Some("2025-03-15".to_string()),
        ..AeFilters::default()
    };
    // Only the Fall AE has a report date on/after the cutoff; records
    // with no report date cannot be confirmed and are excluded.
    let all: Vec<String> = manager
        .all_records(&filters)
        .into_iter()
        .map(|record| record.term)
        .collect();
    assert_eq!(all, vec!["Fall".to_string()]);
}

#[test]
fn screen_failures_are_excluded_from_summary_when_asked() {
    let manager = manager();
    let with_sf = manager.summary_stats(&[], false, false);
    assert_eq!(with_sf.total_aes, 4);
    let without_sf = manager.summary_stats(&[], false, true);
    assert_eq!(without_sf.total_aes, 3);
    assert!(!without_sf.by_patient.contains_key("101-02"));
}

#[test]
fn summary_counts_ongoing_and_relatedness() {
    let manager = manager();
    let stats = manager.summary_stats(&[], false, false);
    // Dyspnea and Edema: no end date, unresolved outcome, non-empty term.
    assert_eq!(stats.ongoing_aes, 2);
    assert_eq!(stats.total_saes, 1);
    let procedure = &stats.relatedness_table["Procedure"];
    assert_eq!(procedure.related, 1);
    assert_eq!(procedure.related_plus_probably, 1);
    assert_eq!(procedure.not_related, 3);
    let delivery = &stats.relatedness_table["Delivery System"];
    assert_eq!(delivery.possibly, 1);
    assert_eq!(delivery.related_plus_probably, 0);
}

#[test]
fn overflow_rows_collapse_per_ae_number() {
    let mut base = ae_sheet();
    // Continuation row for 101-01 AE #1 with no term.
    let extra = DataFrame::new(vec![
        Column::new("Screening #".into(), ["101-01"]),
        Column::new("Template number".into(), ["1"]),
        Column::new("LOGS_AE_AETERM".into(), [""]),
        Column::new("LOGS_AE_AESER".into(), [""]),
        Column::new("LOGS_AE_AESTDTC".into(), [""]),
        Column::new("LOGS_AE_AEENDTC".into(), [""]),
        Column::new("LOGS_AE_AEONGO".into(), [""]),
        Column::new("LOGS_AE_AEOUT".into(), [""]),
        Column::new("LOGS_AE_AEREL1".into(), [""]),
        Column::new("LOGS_AE_AEREL2".into(), [""]),
        Column::new("LOGS_AE_AEREL3".into(), [""]),
        Column::new("LOGS_AE_AEREL4".into(), [""]),
        Column::new("LOGS_AE_AEREPDAT".into(), [""]),
    ])
    .expect("frame");
    base = base.vstack(&extra).expect("vstack");

    let manager = AeManager::new(wide(), Some(base)).expect("manager");
    let records = manager.patient_records("101-01", &AeFilters::default());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].term, "Dyspnea");
}
