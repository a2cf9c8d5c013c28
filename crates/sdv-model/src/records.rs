//! Field-level and form-level fact records.

use serde::{Deserialize, Serialize};

use crate::status::{DataEntryStatus, Metric, RawStatus};

/// Null sentinels that a string cell may carry instead of a real value.
pub const NULL_SENTINELS: [&str; 4] = ["nan", "none", "<na>", "nat"];

/// Returns true when a trimmed cell value represents actual data.
pub fn is_real_value(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !NULL_SENTINELS.contains(&lower.as_str())
}

/// One (patient, variable, row) fact extracted from the modular export.
///
/// Created once per load and immutable thereafter; a reload re-derives the
/// whole set rather than patching individual observations.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldObservation {
    pub patient_id: String,
    /// Raw column code, e.g. `SBV_PE_PEDTC`.
    pub variable_name: String,
    pub visit_code: String,
    pub form_code: String,
    pub form_name: String,
    pub visit_name: String,
    /// EDC field key, e.g. `SBV/MH/MHTERM#1`.
    pub field_key: String,
    pub value: String,
    pub has_value: bool,
    pub hidden: bool,
    pub raw_status: RawStatus,
    /// Instance index within a repeating table, `"0"` when absent.
    pub table_row: String,
    /// Repeatable form number, `"0"` when absent.
    pub repeat_number: String,
}

impl FieldObservation {
    /// Row identity within a repeating form: table row when present,
    /// otherwise the repeatable form number.
    pub fn effective_row(&self) -> &str {
        if self.table_row.is_empty() || self.table_row == "0" {
            &self.repeat_number
        } else {
            &self.table_row
        }
    }

    /// Variable name with the visit prefix stripped.
    pub fn field_suffix(&self) -> &str {
        if !self.visit_code.is_empty() {
            if let Some(rest) = self
                .variable_name
                .strip_prefix(&format!("{}_", self.visit_code))
            {
                return rest;
            }
        }
        &self.variable_name
    }

    /// `{visit}_{form}_{suffix}` key matching the display-tree naming,
    /// falling back to the raw variable name when codes are missing.
    pub fn constructed_key(&self) -> String {
        if !self.visit_code.is_empty() && !self.form_code.is_empty() {
            format!(
                "{}_{}_{}",
                self.visit_code,
                self.form_code,
                self.field_suffix()
            )
        } else if !self.visit_code.is_empty() {
            format!("{}_{}", self.visit_code, self.field_suffix())
        } else {
            self.variable_name.clone()
        }
    }
}

/// Most recent row per (patient, visit, form, repeat) key in the
/// status-history log.
#[derive(Debug, Clone, PartialEq)]
pub struct FormStatusEntry {
    pub data_entry_status: DataEntryStatus,
    pub verification_status: String,
    pub user: String,
    pub timestamp: String,
}

/// The most recent *transition into* a verified state for one key.
///
/// `user`/`timestamp` reflect the verification action itself, never a
/// later approval event on the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEvent {
    pub user: String,
    pub timestamp: String,
}

/// Verification metadata returned by fuzzy lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationDetails {
    pub user: String,
    pub date: String,
    pub status: String,
}

/// A field observation joined with its resolved verdict and labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedField {
    pub patient: String,
    pub site: String,
    pub visit: String,
    pub form: String,
    /// Human-readable field label.
    pub field: String,
    /// Raw variable name.
    pub field_id: String,
    pub value: String,
    pub metric: Metric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_not_values() {
        for sentinel in ["", "  ", "nan", "NaN", "None", "<NA>", "nat"] {
            assert!(!is_real_value(sentinel), "{sentinel:?} should be empty");
        }
        assert!(is_real_value("0"));
        assert!(is_real_value("Atrial fibrillation"));
    }

    #[test]
    fn effective_row_prefers_table_row() {
        let mut obs = FieldObservation {
            patient_id: "206-06".into(),
            variable_name: "LOGS_AE_AETERM".into(),
            visit_code: "LOGS".into(),
            form_code: "AE".into(),
            form_name: "Adverse Event".into(),
            visit_name: "Logs".into(),
            field_key: String::new(),
            value: "Dyspnea".into(),
            has_value: true,
            hidden: false,
            raw_status: RawStatus::Blank,
            table_row: "3".into(),
            repeat_number: "7".into(),
        };
        assert_eq!(obs.effective_row(), "3");
        obs.table_row = "0".into();
        assert_eq!(obs.effective_row(), "7");
    }

    #[test]
    fn classified_field_serializes() {
        let field = ClassifiedField {
            patient: "101-01".into(),
            site: "101".into(),
            visit: "Baseline".into(),
            form: "Vital signs".into(),
            field: "Heart Rate".into(),
            field_id: "SBV_VS_VSORRES_HR".into(),
            value: "72".into(),
            metric: Metric::Verified,
            verified_by: Some("monitor1".into()),
            verified_at: Some("2025-03-15 10:30:00".into()),
        };
        let json = serde_json::to_string(&field).expect("serialize");
        let round: ClassifiedField = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(round, field);
    }
}
