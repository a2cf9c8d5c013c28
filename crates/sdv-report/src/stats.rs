//! Gap statistics: metric counts by study, site, patient, and form, with
//! drill-down into the underlying classified records.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use sdv_model::{ClassifiedField, Metric};

/// Drill-down scope for [`GapStatsAggregator::details`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryLevel<'a> {
    Study,
    Site(&'a str),
    Patient(&'a str),
    /// (patient, form).
    Form(&'a str, &'a str),
}

/// Metric counts keyed by display code, serializable for the embedding
/// UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricCounts {
    #[serde(rename = "NS")]
    pub not_sent: usize,
    #[serde(rename = "V")]
    pub verified: usize,
    #[serde(rename = "!")]
    pub pending: usize,
    #[serde(rename = "GAP")]
    pub gap: usize,
}

impl MetricCounts {
    fn add(&mut self, metric: Metric) {
        match metric {
            Metric::NotSent => self.not_sent += 1,
            Metric::Verified => self.verified += 1,
            Metric::Pending => self.pending += 1,
            Metric::Gap => self.gap += 1,
        }
    }

    pub fn get(&self, metric: Metric) -> usize {
        match metric {
            Metric::NotSent => self.not_sent,
            Metric::Verified => self.verified,
            Metric::Pending => self.pending,
            Metric::Gap => self.gap,
        }
    }

    pub fn total(&self) -> usize {
        self.not_sent + self.verified + self.pending + self.gap
    }
}

/// Aggregated gap statistics over one classification pass.
///
/// Construction replaces all prior state; nothing is updated in place on
/// reload.
#[derive(Debug, Default)]
pub struct GapStatsAggregator {
    fields: Vec<ClassifiedField>,
    study: MetricCounts,
    site: BTreeMap<String, MetricCounts>,
    patient: BTreeMap<String, MetricCounts>,
    form: BTreeMap<(String, String), MetricCounts>,
}

impl GapStatsAggregator {
    /// Builds the aggregation, dropping excluded patients first.
    pub fn from_fields(fields: Vec<ClassifiedField>, excluded_patients: &[String]) -> Self {
        let fields: Vec<ClassifiedField> = fields
            .into_iter()
            .filter(|field| !excluded_patients.contains(&field.patient))
            .collect();

        let mut stats = Self {
            study: MetricCounts::default(),
            site: BTreeMap::new(),
            patient: BTreeMap::new(),
            form: BTreeMap::new(),
            fields: Vec::new(),
        };
        for field in &fields {
            stats.study.add(field.metric);
            stats.site.entry(field.site.clone()).or_default().add(field.metric);
            stats
                .patient
                .entry(field.patient.clone())
                .or_default()
                .add(field.metric);
            stats
                .form
                .entry((field.patient.clone(), field.form.clone()))
                .or_default()
                .add(field.metric);
        }
        stats.fields = fields;
        debug!(
            records = stats.fields.len(),
            sites = stats.site.len(),
            patients = stats.patient.len(),
            "gap statistics aggregated"
        );
        stats
    }

    pub fn record_count(&self) -> usize {
        self.fields.len()
    }

    pub fn study_summary(&self) -> &MetricCounts {
        &self.study
    }

    pub fn site_summary(&self, site: &str) -> MetricCounts {
        self.site.get(site).cloned().unwrap_or_default()
    }

    pub fn patient_summary(&self, patient: &str) -> MetricCounts {
        self.patient.get(patient).cloned().unwrap_or_default()
    }

    pub fn form_summary(&self, patient: &str, form: &str) -> MetricCounts {
        self.form
            .get(&(patient.to_string(), form.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn sites(&self) -> impl Iterator<Item = (&String, &MetricCounts)> {
        self.site.iter()
    }

    pub fn patients(&self) -> impl Iterator<Item = (&String, &MetricCounts)> {
        self.patient.iter()
    }

    /// Drill-down record list for one (level, metric) cell.
    ///
    /// Not-Sent results collapse to one row per patient/visit/form with
    /// the field columns blanked: an unsubmitted form is one finding, not
    /// one per field.
    pub fn details(&self, level: &SummaryLevel<'_>, metric: Metric) -> Vec<ClassifiedField> {
        let mut rows: Vec<ClassifiedField> = self
            .fields
            .iter()
            .filter(|field| field.metric == metric)
            .filter(|field| match level {
                SummaryLevel::Study => true,
                SummaryLevel::Site(site) => field.site == *site,
                SummaryLevel::Patient(patient) => field.patient == *patient,
                SummaryLevel::Form(patient, form) => {
                    field.patient == *patient && field.form == *form
                }
            })
            .cloned()
            .collect();

        if metric == Metric::NotSent {
            let mut seen = std::collections::BTreeSet::new();
            rows.retain_mut(|row| {
                let key = (row.patient.clone(), row.visit.clone(), row.form.clone());
                if !seen.insert(key) {
                    return false;
                }
                row.field.clear();
                row.field_id.clear();
                row.value.clear();
                true
            });
        }
        rows
    }

    /// Highest-count entries at a level for one metric.
    pub fn top_counts(&self, level: TopLevel, metric: Metric, limit: usize) -> Vec<(String, usize)> {
        let source: &BTreeMap<String, MetricCounts> = match level {
            TopLevel::Site => &self.site,
            TopLevel::Patient => &self.patient,
        };
        let mut ranked: Vec<(String, usize)> = source
            .iter()
            .map(|(key, counts)| (key.clone(), counts.get(metric)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

/// Aggregation level for [`GapStatsAggregator::top_counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevel {
    Site,
    Patient,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(patient: &str, form: &str, field_id: &str, metric: Metric) -> ClassifiedField {
        ClassifiedField {
            patient: patient.to_string(),
            site: patient.split('-').next().unwrap_or("").to_string(),
            visit: "Screening".to_string(),
            form: form.to_string(),
            field: field_id.to_string(),
            field_id: field_id.to_string(),
            value: String::new(),
            metric,
            verified_by: None,
            verified_at: None,
        }
    }

    fn sample() -> GapStatsAggregator {
        GapStatsAggregator::from_fields(
            vec![
                field("101-01", "Vital signs", "HR", Metric::Verified),
                field("101-01", "Vital signs", "BMI", Metric::Gap),
                field("101-01", "Labs", "HGB", Metric::Pending),
                field("102-01", "Vital signs", "HR", Metric::Gap),
                field("102-01", "Labs", "HGB", Metric::NotSent),
                field("102-01", "Labs", "PLT", Metric::NotSent),
            ],
            &[],
        )
    }

    #[test]
    fn counts_roll_up_by_level() {
        let stats = sample();
        assert_eq!(stats.study_summary().gap, 2);
        assert_eq!(stats.site_summary("101").verified, 1);
        assert_eq!(stats.patient_summary("102-01").not_sent, 2);
        assert_eq!(stats.form_summary("101-01", "Vital signs").gap, 1);
    }

    #[test]
    fn excluded_patients_are_dropped_before_aggregation() {
        let stats = GapStatsAggregator::from_fields(
            vec![
                field("101-01", "Vital signs", "HR", Metric::Gap),
                field("102-01", "Vital signs", "HR", Metric::Gap),
            ],
            &["102-01".to_string()],
        );
        assert_eq!(stats.study_summary().gap, 1);
        assert_eq!(stats.patient_summary("102-01").total(), 0);
    }

    #[test]
    fn ns_details_collapse_to_form_level() {
        let stats = sample();
        let details = stats.details(&SummaryLevel::Patient("102-01"), Metric::NotSent);
        assert_eq!(details.len(), 1);
        assert!(details[0].field.is_empty());
        assert!(details[0].field_id.is_empty());
    }

    #[test]
    fn drill_down_filters_by_level() {
        let stats = sample();
        assert_eq!(stats.details(&SummaryLevel::Study, Metric::Gap).len(), 2);
        assert_eq!(stats.details(&SummaryLevel::Site("101"), Metric::Gap).len(), 1);
        assert_eq!(
            stats
                .details(&SummaryLevel::Form("101-01", "Vital signs"), Metric::Gap)
                .len(),
            1
        );
    }

    #[test]
    fn top_counts_rank_descending() {
        let stats = sample();
        let top = stats.top_counts(TopLevel::Patient, Metric::NotSent, 5);
        assert_eq!(top[0], ("102-01".to_string(), 2));
    }
}
