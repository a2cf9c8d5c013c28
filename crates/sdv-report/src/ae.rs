//! Adverse-event query service.
//!
//! A stateless query layer over the deduplicated AE sheet plus the wide
//! subject table. The only mutable state is a pair of memoization maps
//! (procedure dates, screen-failure list) owned by the manager and
//! rebuilt with it on every load.

use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use sdv_core::{clean_date, dedupe_repeating_rows, is_checked, parse_date, site_of};
use sdv_ingest::{WideTable, clean_identifier, column_value_string, has_column, parse_f64};
use sdv_model::{AdverseEventRecord, DeathDetails, RelatednessAxes, SaeCriteria, is_real_value};

/// Logical field → ordered list of acceptable raw column names; the first
/// name present in the sheet wins. Resolved once per load.
const COLUMN_ALIASES: [(&str, &[&str]); 21] = [
    ("AE #", &["Template number", "AE #", "AE Number", "AESEQ", "LOGS_AE_AESEQ"]),
    ("SAE?", &["LOGS_AE_AESER", "Is the event SAE?", "AESER", "SAE"]),
    ("AE Term", &["LOGS_AE_AETERM", "adverse event / term", "AETERM", "Term"]),
    ("Severity", &["LOGS_AE_AESEV", "Severity", "AESEV"]),
    ("Interval", &["LOGS_AE_AEINT", "Interval", "AEINT"]),
    ("Onset Date", &["LOGS_AE_AESTDTC", "Date of event onset", "AESTDTC", "Start Date"]),
    ("Resolution Date", &["LOGS_AE_AEENDTC", "Date resolved", "AEENDTC", "End Date"]),
    ("Ongoing", &["LOGS_AE_AEONGO", "Ongoing", "AEONGO"]),
    ("Outcome", &["LOGS_AE_AEOUT", "Outcome", "AEOUT"]),
    ("Rel. PKG Trillium", &["LOGS_AE_AEREL1", "relationship / PKG Trillium", "AEREL1"]),
    ("Rel. Delivery System", &["LOGS_AE_AEREL2", "relationship / PKG Delivery System", "AEREL2"]),
    ("Rel. Handle", &["LOGS_AE_AEREL3", "relationship / PKG Handle", "AEREL3"]),
    ("Rel. Index Procedure", &["LOGS_AE_AEREL4", "relationship / index procedure", "AEREL4"]),
    ("AE Description", &["LOGS_AE_AETERM_COMM", "AE and sequelae / description", "AETERM_COMM"]),
    ("SAE Description", &["LOGS_AE_AETERM_COMM1", "SAE and sequelae / description", "AETERM_COMM1"]),
    ("Hospitalization", &["LOGS_AE_AESHOSP", "Hospitalization", "AESHOSP"]),
    ("Life Threatening", &["LOGS_AE_AESLIFE", "Life Threatening", "AESLIFE"]),
    ("Death", &["LOGS_AE_AESDTH", "Death", "AESDTH"]),
    ("Disability", &["LOGS_AE_AESDISAB", "Disability", "AESDISAB"]),
    ("Other Medical Event", &["LOGS_AE_AESMIE", "Other", "AESMIE"]),
    ("AE Report Date", &["LOGS_AE_AEREPDAT", "AE Report Date", "AEREPDAT"]),
];

/// Prioritized wide-table columns that carry the procedure date.
const PROCEDURE_DATE_CANDIDATES: [&str; 2] = ["TV_PR_PRSTDTC", "TV_PR_SVDTC"];

/// Composable, AND-combined record filters.
#[derive(Debug, Clone, Default)]
pub struct AeFilters {
    /// Seriousness flag must be Yes.
    pub sae_only: bool,
    /// Any relatedness axis other than "Not Related".
    pub device_related_only: bool,
    /// Drop events with onset before the patient's procedure date.
    pub exclude_pre_proc: bool,
    /// Keep only events with onset on/after this date. Records with a
    /// missing or unparseable onset are excluded while the cutoff is
    /// active. An unparseable cutoff value disables the filter.
    pub onset_cutoff: Option<String>,
    /// Same semantics for the report date.
    pub report_cutoff: Option<String>,
}

impl AeFilters {
    fn onset_cutoff_date(&self) -> Option<NaiveDate> {
        cutoff_date(self.onset_cutoff.as_deref(), "onset")
    }

    fn report_cutoff_date(&self) -> Option<NaiveDate> {
        cutoff_date(self.report_cutoff.as_deref(), "report")
    }
}

fn cutoff_date(raw: Option<&str>, which: &str) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse_date(raw);
    if parsed.is_none() {
        warn!(cutoff = raw, which, "unparseable cutoff date, filter disabled");
    }
    parsed
}

fn normalize_boolean(value: &str) -> String {
    match value.trim().to_lowercase().as_str() {
        "yes" | "y" | "1" | "true" => "Yes".to_string(),
        "no" | "n" | "0" | "false" => "No".to_string(),
        _ => value.trim().to_string(),
    }
}

/// Relatedness bucket counts for one assessment axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RelatednessCounts {
    pub related: usize,
    pub probably: usize,
    pub possibly: usize,
    pub not_related: usize,
    pub unknown_or_blank: usize,
    /// Related and Probably combined, the protocol's primary bucket.
    pub related_plus_probably: usize,
}

impl RelatednessCounts {
    /// Substring bucketing, first match wins: exact "related" →
    /// Related (and the combined bucket); "probably" → Probably (and
    /// combined); "possibly" → Possibly; "not related" → Not Related;
    /// everything else, blanks included, → Unknown/Blank.
    pub fn add(&mut self, value: &str) {
        let lower = value.trim().to_lowercase();
        if lower == "related" {
            self.related += 1;
            self.related_plus_probably += 1;
        } else if lower.contains("probably") {
            self.probably += 1;
            self.related_plus_probably += 1;
        } else if lower.contains("possibly") {
            self.possibly += 1;
        } else if lower.contains("not related") {
            self.not_related += 1;
        } else {
            self.unknown_or_blank += 1;
        }
    }
}

/// Summary statistics over the (filtered) AE set.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AeSummaryStats {
    pub total_aes: usize,
    pub total_saes: usize,
    pub fatal_cases: usize,
    pub patients_with_aes: usize,
    pub ongoing_aes: usize,
    pub outcome_distribution: BTreeMap<String, usize>,
    /// Top terms, case-insensitively grouped, reported in the most
    /// frequent original casing.
    pub top_terms: Vec<(String, usize)>,
    pub sae_criteria: BTreeMap<String, usize>,
    pub by_site: BTreeMap<String, usize>,
    pub by_patient: BTreeMap<String, usize>,
    pub per_patient_details: Vec<String>,
    pub relatedness_table: BTreeMap<String, RelatednessCounts>,
    pub death_details: Vec<DeathDetails>,
}

/// Query service over the AE sheet. Stateless apart from the memoized
/// procedure dates and screen-failure list.
pub struct AeManager {
    wide: WideTable,
    /// Deduplicated AE sheet; None when the export had no AE sheet.
    ae_sheet: Option<DataFrame>,
    columns: BTreeMap<&'static str, String>,
    procedure_dates: RefCell<BTreeMap<String, Option<NaiveDate>>>,
    screen_failures: OnceCell<Vec<String>>,
}

impl AeManager {
    /// Builds the manager, resolving column aliases and collapsing
    /// overflow rows once up front.
    pub fn new(wide: WideTable, ae_sheet: Option<DataFrame>) -> Result<Self> {
        let mut columns = BTreeMap::new();
        let ae_sheet = match ae_sheet {
            Some(sheet) => {
                for (logical, candidates) in COLUMN_ALIASES {
                    if let Some(found) = candidates.iter().find(|name| has_column(&sheet, name)) {
                        columns.insert(logical, (*found).to_string());
                    }
                }
                let deduped = match columns.get("AE #") {
                    Some(ae_num) => {
                        let keys = ["Screening #", ae_num.as_str()];
                        let before = sheet.height();
                        let deduped = dedupe_repeating_rows(
                            &sheet,
                            &keys,
                            columns.get("AE Term").map(String::as_str),
                        )?;
                        debug!(before, after = deduped.height(), "AE sheet deduplicated");
                        deduped
                    }
                    None => sheet,
                };
                Some(deduped)
            }
            None => None,
        };
        Ok(Self {
            wide,
            ae_sheet,
            columns,
            procedure_dates: RefCell::new(BTreeMap::new()),
            screen_failures: OnceCell::new(),
        })
    }

    fn column(&self, logical: &str) -> Option<&str> {
        self.columns.get(logical).map(String::as_str)
    }

    fn cell(&self, df: &DataFrame, logical: &str, idx: usize) -> String {
        match self.column(logical) {
            Some(name) => {
                let raw = column_value_string(df, name, idx);
                if is_real_value(&raw) {
                    raw.trim().to_string()
                } else {
                    String::new()
                }
            }
            None => String::new(),
        }
    }

    /// Patients whose enrollment status marks a screen failure. Computed
    /// once and memoized for the manager's lifetime.
    pub fn screen_failures(&self) -> &[String] {
        self.screen_failures
            .get_or_init(|| self.wide.screen_failures())
    }

    /// Procedure date for a patient, resolved from the prioritized
    /// candidate columns and memoized.
    pub fn procedure_date(&self, patient_id: &str) -> Option<NaiveDate> {
        let key = clean_identifier(patient_id);
        if let Some(cached) = self.procedure_dates.borrow().get(&key) {
            return *cached;
        }
        let resolved = self.resolve_procedure_date(&key);
        self.procedure_dates.borrow_mut().insert(key, resolved);
        resolved
    }

    fn resolve_procedure_date(&self, patient_id: &str) -> Option<NaiveDate> {
        let row = self.wide.row_for_patient(patient_id)?;
        let columns = self.wide.column_names();
        for candidate in PROCEDURE_DATE_CANDIDATES {
            for column in columns.iter().filter(|name| name.contains(candidate)) {
                if let Some(date) = parse_date(&self.wide.value(row, column)) {
                    return Some(date);
                }
            }
        }
        None
    }

    fn build_record(&self, df: &DataFrame, idx: usize) -> AdverseEventRecord {
        let ongoing = is_checked(&self.cell(df, "Ongoing", idx));
        let mut resolution_date = clean_date(&self.cell(df, "Resolution Date", idx));
        if ongoing {
            resolution_date = "Ongoing".to_string();
        }
        AdverseEventRecord {
            patient_id: clean_identifier(&column_value_string(df, "Screening #", idx)),
            sequence: self.cell(df, "AE #", idx),
            term: self.cell(df, "AE Term", idx),
            serious: normalize_boolean(&self.cell(df, "SAE?", idx)),
            severity: self.cell(df, "Severity", idx),
            interval: self.cell(df, "Interval", idx),
            onset_date: clean_date(&self.cell(df, "Onset Date", idx)),
            resolution_date,
            ongoing,
            outcome: self.cell(df, "Outcome", idx),
            relatedness: RelatednessAxes {
                device: self.cell(df, "Rel. PKG Trillium", idx),
                delivery_system: self.cell(df, "Rel. Delivery System", idx),
                handle: self.cell(df, "Rel. Handle", idx),
                procedure: self.cell(df, "Rel. Index Procedure", idx),
            },
            description: self.cell(df, "AE Description", idx),
            sae_description: self.cell(df, "SAE Description", idx),
            criteria: SaeCriteria {
                hospitalization: is_checked(&self.cell(df, "Hospitalization", idx)),
                life_threatening: is_checked(&self.cell(df, "Life Threatening", idx)),
                death: is_checked(&self.cell(df, "Death", idx)),
                disability: is_checked(&self.cell(df, "Disability", idx)),
                other_medical_event: is_checked(&self.cell(df, "Other Medical Event", idx)),
            },
            report_date: clean_date(&self.cell(df, "AE Report Date", idx)),
        }
    }

    fn passes_filters(&self, record: &AdverseEventRecord, filters: &AeFilters) -> bool {
        if filters.sae_only && !record.is_sae() {
            return false;
        }
        if filters.device_related_only && !record.relatedness.any_related() {
            return false;
        }
        if filters.exclude_pre_proc {
            if let Some(proc_date) = self.procedure_date(&record.patient_id) {
                if let Some(onset) = parse_date(&record.onset_date) {
                    if onset < proc_date {
                        return false;
                    }
                }
            }
        }
        if let Some(cutoff) = filters.onset_cutoff_date() {
            // Missing or unparseable onset cannot be confirmed as after
            // the cutoff, so the record is excluded.
            match parse_date(&record.onset_date) {
                Some(onset) if onset >= cutoff => {}
                _ => return false,
            }
        }
        if let Some(cutoff) = filters.report_cutoff_date() {
            match parse_date(&record.report_date) {
                Some(report) if report >= cutoff => {}
                _ => return false,
            }
        }
        true
    }

    /// Filtered AE records for one patient, in AE-number order.
    pub fn patient_records(&self, patient_id: &str, filters: &AeFilters) -> Vec<AdverseEventRecord> {
        let Some(df) = &self.ae_sheet else {
            return Vec::new();
        };
        let wanted = clean_identifier(patient_id);
        let mut records: Vec<AdverseEventRecord> = (0..df.height())
            .filter(|&idx| {
                clean_identifier(&column_value_string(df, "Screening #", idx)) == wanted
            })
            .map(|idx| self.build_record(df, idx))
            .filter(|record| self.passes_filters(record, filters))
            .collect();
        records.sort_by(|a, b| {
            let left = parse_f64(&a.sequence).unwrap_or(f64::MAX);
            let right = parse_f64(&b.sequence).unwrap_or(f64::MAX);
            left.partial_cmp(&right).unwrap_or(std::cmp::Ordering::Equal)
        });
        records
    }

    /// Filtered AE records for every patient in the sheet.
    pub fn all_records(&self, filters: &AeFilters) -> Vec<AdverseEventRecord> {
        let Some(df) = &self.ae_sheet else {
            return Vec::new();
        };
        let mut patients: Vec<String> = (0..df.height())
            .map(|idx| clean_identifier(&column_value_string(df, "Screening #", idx)))
            .collect();
        patients.sort();
        patients.dedup();
        patients
            .iter()
            .flat_map(|patient| self.patient_records(patient, filters))
            .collect()
    }

    /// Summary statistics over the AE set after exclusions.
    pub fn summary_stats(
        &self,
        excluded_patients: &[String],
        exclude_pre_proc: bool,
        exclude_screen_failures: bool,
    ) -> AeSummaryStats {
        let mut stats = AeSummaryStats::default();
        let filters = AeFilters {
            exclude_pre_proc,
            ..AeFilters::default()
        };
        let screen_failures: Vec<String> = if exclude_screen_failures {
            self.screen_failures().to_vec()
        } else {
            Vec::new()
        };
        let records: Vec<AdverseEventRecord> = self
            .all_records(&filters)
            .into_iter()
            .filter(|record| !excluded_patients.contains(&record.patient_id))
            .filter(|record| !screen_failures.contains(&record.patient_id))
            .collect();
        if records.is_empty() {
            return stats;
        }

        stats.total_aes = records.len();
        stats.total_saes = records.iter().filter(|r| r.is_sae()).count();
        stats.fatal_cases = records.iter().filter(|r| r.is_fatal()).count();
        stats.ongoing_aes = records.iter().filter(|r| r.is_ongoing()).count();

        let mut patients: Vec<&str> = records.iter().map(|r| r.patient_id.as_str()).collect();
        patients.sort_unstable();
        patients.dedup();
        stats.patients_with_aes = patients.len();

        for record in &records {
            if !record.outcome.is_empty() {
                *stats
                    .outcome_distribution
                    .entry(record.outcome.clone())
                    .or_default() += 1;
            }
            *stats
                .by_site
                .entry(site_of(&record.patient_id))
                .or_default() += 1;
            *stats.by_patient.entry(record.patient_id.clone()).or_default() += 1;
        }

        stats.top_terms = top_terms(&records, 10);
        stats.sae_criteria = sae_criteria_counts(&records);
        stats.relatedness_table = relatedness_table(&records);
        stats.per_patient_details = per_patient_details(&records);
        stats.death_details = self.death_details(&patients);
        stats
    }

    /// Death-form summaries for patients that have adverse events.
    fn death_details(&self, patients: &[&str]) -> Vec<DeathDetails> {
        let columns = self.wide.column_names();
        let date_col = columns.iter().find(|name| name.contains("DTH_DDDTC"));
        let cat_col = columns.iter().find(|name| name.contains("DTH_DDRESCAT"));
        let reason_col = columns.iter().find(|name| name.contains("DTH_DDORRES"));
        let Some(date_col) = date_col else {
            return Vec::new();
        };

        let mut details = Vec::new();
        for patient in patients {
            let Some(row) = self.wide.row_for_patient(patient) else {
                continue;
            };
            let death_date = self.wide.value(row, date_col);
            if !is_real_value(&death_date) {
                continue;
            }
            let read = |column: Option<&&String>| -> String {
                column
                    .map(|name| self.wide.value(row, name.as_str()))
                    .filter(|value| is_real_value(value))
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            };
            details.push(DeathDetails {
                patient_id: (*patient).to_string(),
                death_date: clean_date(&death_date),
                mortality_classification: read(cat_col.as_ref()),
                cause_of_death: read(reason_col.as_ref()),
            });
        }
        details
    }
}

fn top_terms(records: &[AdverseEventRecord], limit: usize) -> Vec<(String, usize)> {
    // Count per lowercase key; remember every original casing with its
    // own count so the display form is the most frequent casing.
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut casings: BTreeMap<String, Vec<(String, usize)>> = BTreeMap::new();
    for record in records {
        let term = record.term.trim();
        if term.is_empty() {
            continue;
        }
        let key = term.to_lowercase();
        *counts.entry(key.clone()).or_default() += 1;
        let seen = casings.entry(key).or_default();
        match seen.iter_mut().find(|(casing, _)| casing == term) {
            Some((_, count)) => *count += 1,
            None => seen.push((term.to_string(), 1)),
        }
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(key, count)| {
            let display = casings[&key]
                .iter()
                .max_by_key(|(_, seen)| *seen)
                .map(|(casing, _)| casing.clone())
                .unwrap_or(key);
            (display, count)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

fn sae_criteria_counts(records: &[AdverseEventRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    counts.insert(
        "Hospitalization".to_string(),
        records.iter().filter(|r| r.criteria.hospitalization).count(),
    );
    counts.insert(
        "Life-threatening".to_string(),
        records.iter().filter(|r| r.criteria.life_threatening).count(),
    );
    counts.insert(
        "Death".to_string(),
        records.iter().filter(|r| r.criteria.death).count(),
    );
    counts.insert(
        "Disability".to_string(),
        records.iter().filter(|r| r.criteria.disability).count(),
    );
    counts.insert(
        "Other Med/Surg".to_string(),
        records.iter().filter(|r| r.criteria.other_medical_event).count(),
    );
    counts
}

fn relatedness_table(records: &[AdverseEventRecord]) -> BTreeMap<String, RelatednessCounts> {
    fn device(r: &AdverseEventRecord) -> &str {
        &r.relatedness.device
    }
    fn delivery(r: &AdverseEventRecord) -> &str {
        &r.relatedness.delivery_system
    }
    fn handle(r: &AdverseEventRecord) -> &str {
        &r.relatedness.handle
    }
    fn procedure(r: &AdverseEventRecord) -> &str {
        &r.relatedness.procedure
    }

    let axes: [(&str, fn(&AdverseEventRecord) -> &str); 4] = [
        ("Device", device),
        ("Delivery System", delivery),
        ("Handle", handle),
        ("Procedure", procedure),
    ];
    let mut table: BTreeMap<String, RelatednessCounts> = BTreeMap::new();
    for (axis, select) in axes {
        let counts = table.entry(axis.to_string()).or_default();
        for record in records {
            counts.add(select(record));
        }
    }
    table
}

fn is_related_value(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    !matches!(lower.as_str(), "not related" | "nan" | "" | "none")
}

fn per_patient_details(records: &[AdverseEventRecord]) -> Vec<String> {
    let mut grouped: BTreeMap<&str, Vec<&AdverseEventRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(&record.patient_id).or_default().push(record);
    }
    let mut lines: Vec<String> = grouped
        .into_iter()
        .map(|(patient, group)| {
            let n_aes = group.len();
            let n_saes = group.iter().filter(|r| r.is_sae()).count();
            let n_ongoing = group.iter().filter(|r| r.is_ongoing()).count();
            let n_device = group
                .iter()
                .filter(|r| {
                    is_related_value(&r.relatedness.device)
                        || is_related_value(&r.relatedness.delivery_system)
                        || is_related_value(&r.relatedness.handle)
                })
                .count();
            let mut n_proc = 0usize;
            let mut n_poss_proc = 0usize;
            for record in &group {
                let value = record.relatedness.procedure.to_lowercase();
                if value.contains("possibly") {
                    n_poss_proc += 1;
                } else if is_related_value(&value) {
                    n_proc += 1;
                }
            }
            format!(
                "{patient}: {n_aes} AEs; including {n_saes} SAEs; {n_device} device-related; \
                 {n_proc} procedure-related; {n_poss_proc} possibly procedure-related; \
                 {n_ongoing} ongoing"
            )
        })
        .collect();
    lines.sort();
    lines
}

/// Fixed preferred ordering of the flat AE export.
pub const PREFERRED_EXPORT_COLUMNS: [&str; 16] = [
    "Patient ID",
    "AE #",
    "SAE?",
    "AE Term",
    "Outcome",
    "Onset Date",
    "Resolution Date",
    "Severity",
    "Rel. PKG Trillium",
    "Rel. Delivery System",
    "Rel. Handle",
    "Rel. Index Procedure",
    "Ongoing",
    "Interval",
    "AE Description",
    "SAE Description",
];

/// Orders export columns: preferred columns first in their fixed order,
/// anything unrecognized appended in first-seen order.
pub fn order_export_columns(available: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = PREFERRED_EXPORT_COLUMNS
        .iter()
        .filter(|preferred| available.iter().any(|name| name == *preferred))
        .map(|name| (*name).to_string())
        .collect();
    for name in available {
        if !ordered.contains(name) {
            ordered.push(name.clone());
        }
    }
    ordered
}

/// Flattens a record into (column, value) pairs in export order.
pub fn export_row(record: &AdverseEventRecord) -> Vec<(&'static str, String)> {
    vec![
        ("Patient ID", record.patient_id.clone()),
        ("AE #", record.sequence.clone()),
        ("SAE?", record.serious.clone()),
        ("AE Term", record.term.clone()),
        ("Outcome", record.outcome.clone()),
        ("Onset Date", record.onset_date.clone()),
        ("Resolution Date", record.resolution_date.clone()),
        ("Severity", record.severity.clone()),
        ("Rel. PKG Trillium", record.relatedness.device.clone()),
        ("Rel. Delivery System", record.relatedness.delivery_system.clone()),
        ("Rel. Handle", record.relatedness.handle.clone()),
        ("Rel. Index Procedure", record.relatedness.procedure.clone()),
        ("Ongoing", if record.ongoing { "Yes" } else { "" }.to_string()),
        ("Interval", record.interval.clone()),
        ("AE Description", record.description.clone()),
        ("SAE Description", record.sae_description.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relatedness_bucketing_first_match() {
        let mut counts = RelatednessCounts::default();
        counts.add("Related");
        assert_eq!(counts.related, 1);
        assert_eq!(counts.related_plus_probably, 1);
        counts.add("Probably Related");
        assert_eq!(counts.probably, 1);
        assert_eq!(counts.related_plus_probably, 2);
        counts.add("Possibly Related");
        assert_eq!(counts.possibly, 1);
        assert_eq!(counts.related_plus_probably, 2);
        counts.add("Not Related");
        counts.add("");
        assert_eq!(counts.not_related, 1);
        assert_eq!(counts.unknown_or_blank, 1);
    }

    #[test]
    fn top_terms_group_case_insensitively() {
        let mut records = Vec::new();
        for casing in ["Dyspnea", "dyspnea", "Dyspnea", "Fall"] {
            records.push(AdverseEventRecord {
                term: casing.to_string(),
                ..AdverseEventRecord::default()
            });
        }
        let terms = top_terms(&records, 10);
        assert_eq!(terms[0], ("Dyspnea".to_string(), 3));
        assert_eq!(terms[1], ("Fall".to_string(), 1));
    }

    #[test]
    fn export_column_ordering_appends_unknown() {
        let available = vec![
            "Custom Flag".to_string(),
            "AE Term".to_string(),
            "Patient ID".to_string(),
        ];
        let ordered = order_export_columns(&available);
        assert_eq!(ordered, vec!["Patient ID", "AE Term", "Custom Flag"]);
    }
}
