//! Per-patient field-status index.
//!
//! The modular export names the same field three ways depending on the
//! form shape: the raw variable name (`SBV_PE_PEDTC`), a constructed
//! `{visit}_{form}_{suffix}` key matching display-tree ids, and the EDC
//! field key with a row marker (`SBV/MH/MHTERM#1`). The index stores all
//! three so lookups from any caller resolve without scanning the table.

use std::collections::BTreeMap;

use sdv_model::{FieldObservation, FieldStatus, RawStatus};

use crate::classify::map_field_status;
use crate::verification::VerificationIndex;

#[derive(Debug, Clone, Copy)]
struct FieldEntry {
    raw: RawStatus,
    hidden: bool,
    has_value: bool,
}

/// Per-patient SDV status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStatusCounts {
    pub verified: usize,
    pub pending: usize,
    pub awaiting: usize,
    pub hidden: usize,
}

/// Index of field-status tuples keyed three ways per patient.
#[derive(Debug, Default)]
pub struct FieldStatusIndex {
    patients: BTreeMap<String, BTreeMap<String, FieldEntry>>,
}

impl FieldStatusIndex {
    pub fn build(observations: &[FieldObservation]) -> Self {
        let mut patients: BTreeMap<String, BTreeMap<String, FieldEntry>> = BTreeMap::new();
        for obs in observations {
            let entry = FieldEntry {
                raw: obs.raw_status,
                hidden: obs.hidden,
                has_value: obs.has_value,
            };
            let fields = patients.entry(obs.patient_id.clone()).or_default();
            update(fields, &obs.variable_name, entry);
            let constructed = obs.constructed_key();
            if constructed != obs.variable_name {
                update(fields, &constructed, entry);
            }
            if obs.field_key.contains('#') {
                update(fields, &obs.field_key, entry);
            }
        }
        Self { patients }
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    /// SDV status for one field, optionally scoped to a repeating-table
    /// row. A `Created` form (per the verification index) short-circuits
    /// to NotSent for every field on it.
    pub fn field_status(
        &self,
        patient_id: &str,
        field_id: &str,
        table_row: Option<&str>,
        form_name: Option<&str>,
        visit_name: Option<&str>,
        verification: Option<&VerificationIndex>,
    ) -> Option<FieldStatus> {
        let patient_id = patient_id.trim();
        let field_id = field_id.trim();

        if let (Some(form), Some(index)) = (form_name, verification) {
            if index.is_form_not_sent(patient_id, form, visit_name, table_row) {
                return Some(FieldStatus::NotSent);
            }
        }

        let fields = self.patients.get(patient_id)?;
        let slashed = field_id.replace('_', "/");

        if let Some(row) = table_row {
            let key_with_row = format!("{slashed}#{row}");
            if let Some(entry) = fields.get(&key_with_row) {
                return Some(status_of(*entry, field_id));
            }
            // Infix row markers: LOGS/AE#1/AETERM matches LOGS/AE/AETERM
            // once the marker is removed.
            let marker = format!("#{row}");
            for (key, entry) in fields {
                if !key.contains(&marker) {
                    continue;
                }
                let cleaned = key.replace(&marker, "");
                if cleaned == slashed {
                    return Some(status_of(*entry, field_id));
                }
                // Complex keys like LOGS/LB_PR_OTH/LBTEST_OTH#1: fall back
                // to suffix matching on the normalized name.
                let normalized = cleaned.replace('/', "_");
                let tail = field_id
                    .split_once('_')
                    .map(|(_, rest)| rest)
                    .unwrap_or(field_id);
                if normalized.contains(field_id)
                    || normalized.ends_with(field_id)
                    || normalized.ends_with(tail)
                {
                    return Some(status_of(*entry, field_id));
                }
            }
        }

        if let Some(entry) = fields.get(field_id) {
            return Some(status_of(*entry, field_id));
        }

        // Table field without a specific row: any row of it will do.
        let prefix = format!("{slashed}#");
        for (key, entry) in fields {
            if key.starts_with(&prefix) {
                return Some(status_of(*entry, field_id));
            }
        }
        None
    }

    pub fn patient_stats(&self, patient_id: &str) -> FieldStatusCounts {
        let mut counts = FieldStatusCounts::default();
        let Some(fields) = self.patients.get(patient_id.trim()) else {
            return counts;
        };
        for (key, entry) in fields {
            match status_of(*entry, key) {
                FieldStatus::Verified | FieldStatus::AutoVerified => counts.verified += 1,
                FieldStatus::Pending | FieldStatus::NotSent => counts.pending += 1,
                FieldStatus::Awaiting => counts.awaiting += 1,
                FieldStatus::Hidden => counts.hidden += 1,
            }
        }
        counts
    }

    pub fn total_stats(&self) -> FieldStatusCounts {
        let mut totals = FieldStatusCounts::default();
        for patient in self.patients.keys() {
            let counts = self.patient_stats(patient);
            totals.verified += counts.verified;
            totals.pending += counts.pending;
            totals.awaiting += counts.awaiting;
            totals.hidden += counts.hidden;
        }
        totals
    }
}

fn status_of(entry: FieldEntry, field_name: &str) -> FieldStatus {
    map_field_status(entry.raw, entry.hidden, entry.has_value, field_name)
}

/// Keeps the most informative tuple per key: visible beats hidden, a
/// value beats no value, and among equals the most recent row wins.
fn update(fields: &mut BTreeMap<String, FieldEntry>, key: &str, new: FieldEntry) {
    match fields.get(key) {
        None => {
            fields.insert(key.to_string(), new);
        }
        Some(old) => {
            if old.hidden && !new.hidden {
                fields.insert(key.to_string(), new);
            } else if old.hidden == new.hidden
                && (old.has_value == new.has_value || (!old.has_value && new.has_value))
            {
                fields.insert(key.to_string(), new);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(var: &str, field_key: &str, value: &str, raw: RawStatus) -> FieldObservation {
        FieldObservation {
            patient_id: "206-06".to_string(),
            variable_name: var.to_string(),
            visit_code: String::new(),
            form_code: String::new(),
            form_name: "Medical History".to_string(),
            visit_name: "Screening".to_string(),
            field_key: field_key.to_string(),
            value: value.to_string(),
            has_value: !value.is_empty(),
            hidden: false,
            raw_status: raw,
            table_row: "0".to_string(),
            repeat_number: "0".to_string(),
        }
    }

    #[test]
    fn direct_variable_lookup() {
        let index = FieldStatusIndex::build(&[obs(
            "SBV_PE_PEDTC",
            "",
            "2025-01-10",
            RawStatus::Verified,
        )]);
        let status = index.field_status("206-06", "SBV_PE_PEDTC", None, None, None, None);
        assert_eq!(status, Some(FieldStatus::Verified));
    }

    #[test]
    fn field_key_row_lookup() {
        let index = FieldStatusIndex::build(&[obs(
            "SBV_MH_MHTERM",
            "SBV/MH/MHTERM#1",
            "Hypertension",
            RawStatus::Blank,
        )]);
        let status = index.field_status("206-06", "SBV_MH_MHTERM", Some("1"), None, None, None);
        assert_eq!(status, Some(FieldStatus::Pending));
    }

    #[test]
    fn infix_row_marker_lookup() {
        let index = FieldStatusIndex::build(&[obs(
            "ignored",
            "LOGS/AE#3/AETERM",
            "Dyspnea",
            RawStatus::Verified,
        )]);
        let status = index.field_status("206-06", "LOGS_AE_AETERM", Some("3"), None, None, None);
        assert_eq!(status, Some(FieldStatus::Verified));
    }

    #[test]
    fn unknown_patient_or_field_is_none() {
        let index = FieldStatusIndex::build(&[]);
        assert_eq!(
            index.field_status("999-99", "SBV_PE_PEDTC", None, None, None, None),
            None
        );
    }

    #[test]
    fn visible_entry_replaces_hidden_duplicate() {
        let mut hidden = obs("SBV_PE_PEDTC", "", "", RawStatus::Blank);
        hidden.hidden = true;
        let visible = obs("SBV_PE_PEDTC", "", "2025-01-10", RawStatus::Blank);
        let index = FieldStatusIndex::build(&[hidden, visible]);
        let status = index.field_status("206-06", "SBV_PE_PEDTC", None, None, None, None);
        assert_eq!(status, Some(FieldStatus::Pending));
    }

    #[test]
    fn stats_bucket_by_display_status() {
        let index = FieldStatusIndex::build(&[
            obs("A", "", "x", RawStatus::Verified),
            obs("B", "", "y", RawStatus::AutoVerified),
            obs("C", "", "z", RawStatus::Blank),
            obs("D", "", "", RawStatus::AwaitingReverification),
        ]);
        let counts = index.patient_stats("206-06");
        assert_eq!(counts.verified, 2);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.awaiting, 1);
        assert_eq!(index.total_stats(), counts);
    }
}
