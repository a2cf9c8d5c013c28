//! Status classification: raw field facts → display status → metric.

use tracing::debug;

use sdv_ingest::LabelDictionary;
use sdv_model::{ClassifiedField, FieldObservation, FieldStatus, Metric, RawStatus};

use crate::suppression::SuppressionContext;
use crate::verification::{FormKey, VerificationIndex};

/// Field-name fragments that mark checkbox fields: an empty checkbox
/// means "unchecked", not "missing".
const CHECKBOX_SUBSTRINGS: [&str; 5] = ["ONGO", "OCCUR", "AEACN", "AESAE", "YN"];

/// Suffix-only checkbox patterns; substring matching would catch lab
/// fields like `ALT` or the many non-checkbox `_PR` columns.
const CHECKBOX_SUFFIXES: [&str; 2] = ["_LTFL", "_PRFL"];

pub fn is_checkbox_field(field_name: &str) -> bool {
    CHECKBOX_SUBSTRINGS
        .iter()
        .any(|fragment| field_name.contains(fragment))
        || CHECKBOX_SUFFIXES
            .iter()
            .any(|suffix| field_name.ends_with(suffix))
}

/// Maps one field's raw facts to its display status.
///
/// A `Created` form-level status overrides this mapping entirely; the
/// caller checks that first (see [`crate::field_index::FieldStatusIndex`]).
pub fn map_field_status(
    raw: RawStatus,
    hidden: bool,
    has_value: bool,
    field_name: &str,
) -> FieldStatus {
    match raw {
        RawStatus::Blank => {
            if hidden {
                FieldStatus::Hidden
            } else if !has_value && !is_checkbox_field(field_name) {
                FieldStatus::NotSent
            } else {
                FieldStatus::Pending
            }
        }
        RawStatus::Changed => FieldStatus::Pending,
        RawStatus::Verified => FieldStatus::Verified,
        RawStatus::AwaitingReverification => FieldStatus::Awaiting,
        RawStatus::AutoVerified => FieldStatus::AutoVerified,
    }
}

/// Everything the classifier needs for one pass.
pub struct Classifier<'a> {
    index: Option<&'a VerificationIndex>,
    labels: &'a LabelDictionary,
}

impl<'a> Classifier<'a> {
    pub fn new(index: Option<&'a VerificationIndex>, labels: &'a LabelDictionary) -> Self {
        Self { index, labels }
    }

    /// Classifies the full observation set.
    pub fn classify_all(&self, observations: &[FieldObservation]) -> Vec<ClassifiedField> {
        self.classify_observations(observations)
    }

    /// Classifies a single patient. Suppression context is scoped to the
    /// patient's own rows, which is equivalent to the full pass because
    /// every context key carries the patient id.
    pub fn classify_patient(
        &self,
        observations: &[FieldObservation],
        patient_id: &str,
    ) -> Vec<ClassifiedField> {
        let wanted = patient_id.trim();
        let subset: Vec<FieldObservation> = observations
            .iter()
            .filter(|obs| obs.patient_id == wanted)
            .cloned()
            .collect();
        self.classify_observations(&subset)
    }

    fn classify_observations(&self, observations: &[FieldObservation]) -> Vec<ClassifiedField> {
        let ctx = SuppressionContext::build(observations, self.labels.not_done_variables());
        let not_sent = self
            .index
            .map(VerificationIndex::not_sent_keys)
            .unwrap_or_default();
        let verified_forms = self
            .index
            .map(VerificationIndex::verified_form_keys)
            .unwrap_or_default();

        let mut out = Vec::with_capacity(observations.len());
        for obs in observations {
            let lookup = FormKey::new(
                &obs.patient_id,
                &obs.form_name,
                &obs.visit_name,
                &obs.table_row,
            );
            let is_ns = not_sent.contains(&lookup);
            let form_verified = verified_forms.contains(&lookup);
            let is_ecg_checkbox = ctx.is_ecg_checkbox(obs);
            let excluded_gap = ctx.is_excluded_gap(obs);

            let is_verified = obs.raw_status.is_verified();
            let is_pending = obs.raw_status.is_pending_code()
                || (obs.raw_status == RawStatus::Blank && obs.has_value && !obs.hidden)
                || (is_ecg_checkbox && !obs.has_value)
                || (excluded_gap && !obs.has_value && !obs.hidden && !form_verified);
            let is_gap = !obs.has_value
                && !obs.hidden
                && !form_verified
                && !is_ecg_checkbox
                && ctx.form_has_any_data(obs)
                && !excluded_gap;

            // Priority: NS > V > ! > GAP. Rows matching none are dropped.
            let metric = if is_ns {
                Some(Metric::NotSent)
            } else if is_verified {
                Some(Metric::Verified)
            } else if is_pending {
                Some(Metric::Pending)
            } else if is_gap {
                Some(Metric::Gap)
            } else {
                None
            };
            let Some(metric) = metric else {
                continue;
            };

            let (verified_by, verified_at) = if metric == Metric::Verified {
                self.index
                    .and_then(|index| {
                        index.verification_details(
                            &obs.patient_id,
                            &obs.form_name,
                            Some(&obs.visit_name),
                            Some(obs.effective_row()),
                        )
                    })
                    .map(|details| (Some(details.user), Some(details.date)))
                    .unwrap_or((None, None))
            } else {
                (None, None)
            };

            out.push(ClassifiedField {
                patient: obs.patient_id.clone(),
                site: site_of(&obs.patient_id),
                visit: obs.visit_name.clone(),
                form: obs.form_name.clone(),
                field: self.labels.display(&obs.variable_name),
                field_id: obs.variable_name.clone(),
                value: obs.value.clone(),
                metric,
                verified_by,
                verified_at,
            });
        }
        debug!(
            classified = out.len(),
            total = observations.len(),
            "classification pass complete"
        );
        out
    }
}

/// Site identifier embedded in the patient id: everything before the
/// first dash.
pub fn site_of(patient_id: &str) -> String {
    patient_id
        .split('-')
        .next()
        .unwrap_or(patient_id)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkbox_detection() {
        assert!(is_checkbox_field("LOGS_AE_AEONGO"));
        assert!(is_checkbox_field("SBV_MH_MHOCCUR"));
        assert!(is_checkbox_field("SBV_X_PRFL"));
        // Suffix patterns must not fire on substrings
        assert!(!is_checkbox_field("SBV_LB_LFP_LBORRES_ALT"));
        assert!(!is_checkbox_field("SBV_VS_VSORRES_HR"));
    }

    #[test]
    fn blank_empty_checkbox_is_pending_not_notsent() {
        let status = map_field_status(RawStatus::Blank, false, false, "LOGS_AE_AEONGO");
        assert_eq!(status, FieldStatus::Pending);
        let status = map_field_status(RawStatus::Blank, false, false, "SBV_VS_VSORRES_HR");
        assert_eq!(status, FieldStatus::NotSent);
    }

    #[test]
    fn hidden_wins_for_blank_fields() {
        let status = map_field_status(RawStatus::Blank, true, false, "SBV_VS_VSORRES_HR");
        assert_eq!(status, FieldStatus::Hidden);
    }

    #[test]
    fn status_mapping_is_total_over_the_grid() {
        for code in 0..=5 {
            for hidden in [false, true] {
                for has_value in [false, true] {
                    let _ = map_field_status(
                        RawStatus::from_code(code),
                        hidden,
                        has_value,
                        "SBV_VS_VSORRES_HR",
                    );
                }
            }
        }
    }

    #[test]
    fn site_extraction() {
        assert_eq!(site_of("206-06"), "206");
        assert_eq!(site_of("plain"), "plain");
    }
}
