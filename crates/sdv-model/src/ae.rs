//! Adverse-event record types.

use serde::{Deserialize, Serialize};

/// The four independent relatedness assessments collected per event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatednessAxes {
    /// Investigational device.
    pub device: String,
    pub delivery_system: String,
    pub handle: String,
    /// Index procedure.
    pub procedure: String,
}

impl RelatednessAxes {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.device.as_str(),
            self.delivery_system.as_str(),
            self.handle.as_str(),
            self.procedure.as_str(),
        ]
        .into_iter()
    }

    /// True when any axis carries a value other than "Not Related".
    /// Blank axes do not count as related.
    pub fn any_related(&self) -> bool {
        self.iter().any(|value| {
            let lower = value.trim().to_lowercase();
            !lower.is_empty() && lower != "not related" && lower != "nan" && lower != "none"
        })
    }
}

/// SAE seriousness-criterion checkboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaeCriteria {
    pub hospitalization: bool,
    pub life_threatening: bool,
    pub death: bool,
    pub disability: bool,
    pub other_medical_event: bool,
}

/// One deduplicated adverse event for a patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdverseEventRecord {
    pub patient_id: String,
    /// AE sequence number within the patient.
    pub sequence: String,
    pub term: String,
    /// Normalized to "Yes"/"No" where recognizable.
    pub serious: String,
    pub severity: String,
    /// Pre- vs post-procedure interval marker.
    pub interval: String,
    pub onset_date: String,
    /// `"Ongoing"` when the ongoing flag is checked.
    pub resolution_date: String,
    pub ongoing: bool,
    pub outcome: String,
    pub relatedness: RelatednessAxes,
    pub description: String,
    pub sae_description: String,
    pub criteria: SaeCriteria,
    pub report_date: String,
}

impl AdverseEventRecord {
    pub fn is_sae(&self) -> bool {
        self.serious == "Yes"
    }

    /// Explicit ongoing flag OR implied: no resolution date, an outcome
    /// that is not fatal/recovered/resolved, and a non-empty term. Sites
    /// sometimes skip the checkbox while leaving the end date blank for a
    /// genuinely unresolved event.
    pub fn is_ongoing(&self) -> bool {
        if self.ongoing {
            return true;
        }
        let end = self.resolution_date.trim().to_lowercase();
        let no_end_date = end.is_empty() || end == "nan" || end == "nat" || end == "none";
        let outcome = self.outcome.to_lowercase();
        let unresolved_outcome = !outcome.contains("fatal")
            && !outcome.contains("recovered")
            && !outcome.contains("resolved");
        no_end_date && unresolved_outcome && !self.term.trim().is_empty()
    }

    pub fn is_fatal(&self) -> bool {
        self.outcome.trim().eq_ignore_ascii_case("fatal")
    }
}

/// Death-form summary for a patient with adverse events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathDetails {
    pub patient_id: String,
    pub death_date: String,
    pub mortality_classification: String,
    pub cause_of_death: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(end: &str, outcome: &str, term: &str, ongoing: bool) -> AdverseEventRecord {
        AdverseEventRecord {
            resolution_date: end.into(),
            outcome: outcome.into(),
            term: term.into(),
            ongoing,
            ..AdverseEventRecord::default()
        }
    }

    #[test]
    fn implicit_ongoing_requires_open_outcome_and_term() {
        assert!(record("", "Not Recovered", "Dyspnea", false).is_ongoing());
        assert!(!record("2025-04-01", "Not Recovered", "Dyspnea", false).is_ongoing());
        assert!(!record("", "Recovered", "Dyspnea", false).is_ongoing());
        assert!(!record("", "Fatal", "Dyspnea", false).is_ongoing());
        assert!(!record("", "Not Recovered", "", false).is_ongoing());
        // Explicit flag wins regardless of other fields.
        assert!(record("2025-04-01", "Recovered", "", true).is_ongoing());
    }

    #[test]
    fn relatedness_ignores_blanks() {
        let mut axes = RelatednessAxes::default();
        assert!(!axes.any_related());
        axes.device = "Not Related".into();
        axes.handle = "nan".into();
        assert!(!axes.any_related());
        axes.procedure = "Possibly Related".into();
        assert!(axes.any_related());
    }
}
