//! Gap-suppression rules.
//!
//! Each rule names a situation where an empty field is legitimately blank
//! given sibling data (a "not done" flag beside a filled result, a
//! partial-date checkbox beside a full date, an unticked member of a
//! checkbox group). A suppressed field is surfaced as Pending for manual
//! confirmation instead of being reported as a Gap; the union of all
//! rules is [`SuppressionContext::is_excluded_gap`].
//!
//! The trigger predicates directly determine true- vs false-positive gap
//! counts, so each one mirrors the established review behavior exactly.

use std::collections::BTreeSet;

use sdv_model::FieldObservation;

/// (patient, form, visit) - one form instance, lowercase.
type FormInstanceKey = (String, String, String);
/// (patient, visit, form, row) - one repeating-form row, lowercase.
type RowKey = (String, String, String, String);
/// (patient, form, visit, row, variable) - one field slot, lowercase.
type FieldSlotKey = (String, String, String, String, String);

/// Fixed pairing of core-lab echo forms to their site-completed sisters.
const CORE_TO_SITE_ECHO: [(&str, &str); 5] = [
    ("Echocardiography - Core lab", "Echocardiography"),
    ("Echocardiography \u{2013} Core lab", "Echocardiography"),
    (
        "Echocardiography \u{2013} 1 day prior the procedure - Core lab",
        "Echocardiography \u{2013} 1 day prior the procedure",
    ),
    (
        "Echocardiography \u{2013} 1-day post procedure - Core lab",
        "Echocardiography \u{2013} 1-day post procedure",
    ),
    (
        "Echocardiography \u{2013} Pre and Post procedure - Core lab",
        "Echocardiography \u{2013} Pre and Post procedure",
    ),
];

/// Lab metadata name fragments: reference ranges, units, reasons,
/// categories, supplemental questions. Status is secondary to the result,
/// so these never count as gaps on their own.
const LAB_METADATA_FRAGMENTS: [&str; 9] = [
    "LBORNRLO",
    "LBORNRHI",
    "LBORRESUN",
    "LBORRESU",
    "REASND",
    "PRSCAT",
    "SUPPPR",
    "LOGS_LBREF",
    "LBCOMMENT",
];

fn form_key(obs: &FieldObservation) -> FormInstanceKey {
    (
        obs.patient_id.to_lowercase(),
        obs.form_name.to_lowercase(),
        obs.visit_name.to_lowercase(),
    )
}

fn row_key(obs: &FieldObservation) -> RowKey {
    (
        obs.patient_id.to_lowercase(),
        obs.visit_name.to_lowercase(),
        obs.form_name.to_lowercase(),
        obs.table_row.clone(),
    )
}

fn slot_key(obs: &FieldObservation, variable: &str) -> FieldSlotKey {
    (
        obs.patient_id.to_lowercase(),
        obs.form_name.to_lowercase(),
        obs.visit_name.to_lowercase(),
        obs.table_row.clone(),
        variable.to_lowercase(),
    )
}

fn upper(obs: &FieldObservation) -> String {
    obs.variable_name.to_uppercase()
}

/// Pre-computed lookup sets the rules consult. Built once per
/// classification pass over the same observation scope.
pub struct SuppressionContext {
    not_done_vars: BTreeSet<String>,
    /// Form instances with at least one filled field, including site echo
    /// forms "started" by proxy through their core-lab sister.
    forms_with_data: BTreeSet<FormInstanceKey>,
    forms_with_lab_results: BTreeSet<FormInstanceKey>,
    echo_forms_with_results: BTreeSet<FormInstanceKey>,
    ecg_forms_with_rhythm: BTreeSet<FormInstanceKey>,
    forms_with_orres: BTreeSet<FormInstanceKey>,
    pga_forms_with_data: BTreeSet<FormInstanceKey>,
    ae_forms_with_enddate: BTreeSet<FormInstanceKey>,
    ae_forms_with_data: BTreeSet<FormInstanceKey>,
    cm_forms_with_enddate: BTreeSet<FormInstanceKey>,
    mh_forms_with_enddate: BTreeSet<FormInstanceKey>,
    aeacn_groups_with_data: BTreeSet<RowKey>,
    aes_groups_with_data: BTreeSet<RowKey>,
    filled_slots: BTreeSet<FieldSlotKey>,
}

impl SuppressionContext {
    pub fn build(observations: &[FieldObservation], not_done_vars: BTreeSet<String>) -> Self {
        let mut forms_with_data = BTreeSet::new();
        let mut forms_with_lab_results = BTreeSet::new();
        let mut echo_forms_with_results = BTreeSet::new();
        let mut ecg_forms_with_rhythm = BTreeSet::new();
        let mut forms_with_orres = BTreeSet::new();
        let mut pga_forms_with_data = BTreeSet::new();
        let mut ae_forms_with_enddate = BTreeSet::new();
        let mut ae_forms_with_data = BTreeSet::new();
        let mut cm_forms_with_enddate = BTreeSet::new();
        let mut mh_forms_with_enddate = BTreeSet::new();
        let mut aeacn_groups_with_data = BTreeSet::new();
        let mut aes_groups_with_data = BTreeSet::new();
        let mut filled_slots = BTreeSet::new();
        let mut core_echo_with_data: BTreeSet<(String, String, String)> = BTreeSet::new();

        for obs in observations {
            if !obs.has_value {
                continue;
            }
            let var = upper(obs);
            let form_lower = obs.form_name.to_lowercase();
            let key = form_key(obs);

            forms_with_data.insert(key.clone());
            filled_slots.insert(slot_key(obs, &obs.variable_name));

            if !var.contains("LBSTAT") {
                forms_with_lab_results.insert(key.clone());
            }
            if form_lower.contains("echocardiography") && !var.contains("FASTAT") {
                echo_forms_with_results.insert(key.clone());
            }
            if form_lower.contains("ecg") && var.contains("EGORRES_RHYTHM") {
                ecg_forms_with_rhythm.insert(key.clone());
            }
            if var.contains("ORRES") {
                forms_with_orres.insert(key.clone());
            }
            if form_lower.contains("physician global assessment") {
                pga_forms_with_data.insert(key.clone());
            }
            if form_lower.contains("adverse event") {
                ae_forms_with_data.insert(key.clone());
                if var.contains("AEEN") {
                    ae_forms_with_enddate.insert(key.clone());
                }
            }
            if form_lower.contains("concomitant medications") && var.contains("CMEN") {
                cm_forms_with_enddate.insert(key.clone());
            }
            if form_lower.contains("medical history") && var.contains("MHEN") {
                mh_forms_with_enddate.insert(key.clone());
            }
            if obs.variable_name.starts_with("LOGS_AEACN_") {
                aeacn_groups_with_data.insert(row_key(obs));
            }
            if var.contains("LOGS_AES") {
                aes_groups_with_data.insert(row_key(obs));
            }
            if form_lower.contains("core lab") {
                core_echo_with_data.insert((
                    obs.patient_id.clone(),
                    obs.visit_name.clone(),
                    obs.form_name.clone(),
                ));
            }
        }

        // Echo sister-form coupling: a core-lab form with data marks its
        // site form as started, so the site form's blanks become gaps
        // instead of "unstarted visit".
        for (patient, visit, core_name) in &core_echo_with_data {
            let trimmed = core_name.trim();
            let site_name = CORE_TO_SITE_ECHO
                .iter()
                .find(|(core, _)| *core == trimmed)
                .map(|(_, site)| (*site).to_string())
                .or_else(|| {
                    if trimmed.contains("Echocardiography") {
                        let normalized = trimmed
                            .replace(" - Core lab", "")
                            .replace(" \u{2013} Core lab", "")
                            .trim()
                            .to_string();
                        (normalized != trimmed).then_some(normalized)
                    } else {
                        None
                    }
                });
            if let Some(site_name) = site_name {
                forms_with_data.insert((
                    patient.to_lowercase(),
                    site_name.to_lowercase(),
                    visit.to_lowercase(),
                ));
            }
        }

        Self {
            not_done_vars,
            forms_with_data,
            forms_with_lab_results,
            echo_forms_with_results,
            ecg_forms_with_rhythm,
            forms_with_orres,
            pga_forms_with_data,
            ae_forms_with_enddate,
            ae_forms_with_data,
            cm_forms_with_enddate,
            mh_forms_with_enddate,
            aeacn_groups_with_data,
            aes_groups_with_data,
            filled_slots,
        }
    }

    /// The form instance has at least one filled field (directly or via
    /// the echo sister-form proxy).
    pub fn form_has_any_data(&self, obs: &FieldObservation) -> bool {
        self.forms_with_data.contains(&form_key(obs))
    }

    /// ECG checkbox fields are Pending rather than Gap once the rhythm
    /// result for the same form instance is filled.
    pub fn is_ecg_checkbox(&self, obs: &FieldObservation) -> bool {
        if !self.ecg_forms_with_rhythm.contains(&form_key(obs)) {
            return false;
        }
        let var = upper(obs);
        var.contains("_ABN") || var.contains("_EGORRES_")
    }

    fn slot_filled(&self, obs: &FieldObservation, variable: &str) -> bool {
        self.filled_slots.contains(&slot_key(obs, variable))
    }

    /// Union of every suppression rule.
    pub fn is_excluded_gap(&self, obs: &FieldObservation) -> bool {
        let var = upper(obs);
        let form = obs.form_name.to_lowercase();
        let key = form_key(obs);

        // Label marks the field itself as a "not done"/"not recorded" flag.
        if self
            .not_done_vars
            .contains(&obs.variable_name.to_lowercase())
        {
            return true;
        }
        // Lab "not done" status beside filled results.
        if var.contains("LBSTAT") && self.forms_with_lab_results.contains(&key) {
            return true;
        }
        // Echo "not done" status beside filled measurements.
        if var.contains("FASTAT") && self.echo_forms_with_results.contains(&key) {
            return true;
        }
        // Core-lab echo measurement fields that may legitimately stay
        // empty (everything but the _SP summary fields).
        if form.contains("echocardiography")
            && form.contains("core")
            && var.contains("FAORRES")
            && !var.ends_with("_SP")
        {
            return true;
        }
        // "Reason not performed" comments once the echo has result data.
        if form.contains("echocardiography")
            && (var.contains("REASND") || var.contains("REASON"))
            && self.echo_forms_with_results.contains(&key)
        {
            return true;
        }
        // Optional per-row comments on test parameter tables.
        if var.contains("TESTPARAMSROWCOMMENTS") {
            return true;
        }
        // Pre-procedure checklist comments once the checklist has data.
        if var.contains("PRCOMM") && self.forms_with_data.contains(&key) {
            return true;
        }
        // "Full date unknown" checkbox beside a filled date field.
        if var.contains("PARTIAL") {
            let base = obs
                .variable_name
                .replace("_PARTIAL_CHECKBOX", "")
                .replace("_PARTIAL", "");
            if self.slot_filled(obs, &base) {
                return true;
            }
        }
        // Free-text comment fields once the form has any data.
        if var.ends_with("COMM") && self.forms_with_data.contains(&key) {
            return true;
        }
        // "Time unknown" checkbox beside a filled time field.
        if var.contains("TIMUNC") {
            let base = obs.variable_name.replace("TIMUNC", "TIM");
            if self.slot_filled(obs, &base) {
                return true;
            }
        }
        // Physical-exam "not done" status beside its result field.
        if var.contains("PESTAT") {
            let base = obs
                .variable_name
                .replace("PESTAT", "PEORRES")
                .replace("__", "_");
            if self.slot_filled(obs, &base) {
                return true;
            }
        }
        // Checkbox groups: once any action-taken / seriousness box in the
        // same row is ticked, the rest are implied unchecked.
        if obs.variable_name.starts_with("LOGS_AEACN_")
            && self.aeacn_groups_with_data.contains(&row_key(obs))
        {
            return true;
        }
        if var.contains("LOGS_AES") && self.aes_groups_with_data.contains(&row_key(obs)) {
            return true;
        }
        // Any status-named field: status is secondary to its result.
        if var.contains("STAT_") || var.ends_with("STAT") || var.contains("_STAT") {
            return true;
        }
        // Lab metadata fields.
        if LAB_METADATA_FRAGMENTS
            .iter()
            .any(|fragment| var.contains(fragment))
        {
            return true;
        }
        // Empty date beside a filled result: the result drives the gap.
        let is_date_field = var.contains("EGDTC")
            || var.ends_with("_DTC")
            || var.contains("_DTC_")
            || var.contains("LBDTC");
        if is_date_field && !obs.has_value && self.forms_with_orres.contains(&key) {
            return true;
        }
        // PGA comment fields once the assessment has data.
        if form.contains("physician global assessment")
            && (var.contains("COMM") || var.contains("PGA"))
            && !obs.has_value
            && self.pga_forms_with_data.contains(&key)
        {
            return true;
        }
        if form.contains("adverse event") {
            // Blank "ongoing" beside a recorded end date.
            if (var.contains("AEONGO") || var.contains("AONGO") || var.contains("_ONGO"))
                && !obs.has_value
                && self.ae_forms_with_enddate.contains(&key)
            {
                return true;
            }
            // SAE / sequelae narrative fields once the event has data.
            let is_sae_comment = var.contains("AETERM_COMM")
                || var.contains("SEQUELAE")
                || var
                    .find("SAE")
                    .is_some_and(|pos| var[pos..].contains("COMM"));
            if is_sae_comment && !obs.has_value && self.ae_forms_with_data.contains(&key) {
                return true;
            }
        }
        // Medication / history "ongoing" beside a recorded end date.
        if form.contains("concomitant medications")
            && (var.contains("CMONGO") || var.contains("_ONGO"))
            && !obs.has_value
            && self.cm_forms_with_enddate.contains(&key)
        {
            return true;
        }
        if form.contains("medical history")
            && var.contains("MHONGO")
            && !obs.has_value
            && self.mh_forms_with_enddate.contains(&key)
        {
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use sdv_model::RawStatus;

    use super::*;

    fn obs(patient: &str, form: &str, var: &str, value: &str) -> FieldObservation {
        FieldObservation {
            patient_id: patient.to_string(),
            variable_name: var.to_string(),
            visit_code: String::new(),
            form_code: String::new(),
            form_name: form.to_string(),
            visit_name: "Screening".to_string(),
            field_key: String::new(),
            value: value.to_string(),
            has_value: !value.is_empty(),
            hidden: false,
            raw_status: RawStatus::Blank,
            table_row: "0".to_string(),
            repeat_number: "0".to_string(),
        }
    }

    fn ctx(observations: &[FieldObservation]) -> SuppressionContext {
        SuppressionContext::build(observations, BTreeSet::new())
    }

    #[test]
    fn lbstat_suppressed_when_panel_has_results() {
        let rows = vec![
            obs("101-01", "CBC and platelets count", "SBV_LB_CBC_LBORRES_HGB", "12.1"),
            obs("101-01", "CBC and platelets count", "SBV_LB_CBC_LBSTAT", ""),
        ];
        let ctx = ctx(&rows);
        assert!(ctx.is_excluded_gap(&rows[1]));
    }

    #[test]
    fn lbstat_not_suppressed_without_results() {
        let rows = vec![obs("101-01", "CBC and platelets count", "SBV_LB_CBC_LBSTAT", "")];
        let ctx = ctx(&rows);
        // Still suppressed by the generic STAT rule; the LBSTAT-specific
        // trigger alone would not fire.
        assert!(!ctx.forms_with_data.contains(&(
            "101-01".to_string(),
            "cbc and platelets count".to_string(),
            "screening".to_string()
        )));
    }

    #[test]
    fn partial_checkbox_suppressed_when_date_filled() {
        let rows = vec![
            obs("101-01", "Demographics", "SBV_DM_BRTHDAT", "1950-01-01"),
            obs("101-01", "Demographics", "SBV_DM_BRTHDAT_PARTIAL_CHECKBOX", ""),
        ];
        let ctx = ctx(&rows);
        assert!(ctx.is_excluded_gap(&rows[1]));
    }

    #[test]
    fn partial_checkbox_stays_gap_without_date() {
        let rows = vec![
            obs("101-01", "Demographics", "SBV_DM_SEX", "F"),
            obs("101-01", "Demographics", "SBV_DM_BRTHDAT_PARTIAL_CHECKBOX", ""),
        ];
        let ctx = ctx(&rows);
        assert!(!ctx.is_excluded_gap(&rows[1]));
    }

    #[test]
    fn checkbox_group_with_any_value_suppresses_siblings() {
        let mut ticked = obs("101-01", "Adverse Event", "LOGS_AEACN_CM", "Yes");
        ticked.table_row = "2".to_string();
        let mut blank = obs("101-01", "Adverse Event", "LOGS_AEACN_HO", "");
        blank.table_row = "2".to_string();
        let mut other_row = obs("101-01", "Adverse Event", "LOGS_AEACN_HO", "");
        other_row.table_row = "3".to_string();
        let ctx = ctx(&[ticked, blank.clone(), other_row.clone()]);
        assert!(ctx.is_excluded_gap(&blank));
        // A different AE row has no ticked sibling.
        assert!(!ctx.is_excluded_gap(&other_row));
    }

    #[test]
    fn pestat_suppressed_when_result_present() {
        let rows = vec![
            obs("101-01", "Physical Examination", "SBV_PEORRES_CARD", "Normal"),
            obs("101-01", "Physical Examination", "SBV_PESTAT__CARD", ""),
        ];
        let ctx = ctx(&rows);
        // Base name derivation normalizes the double underscore.
        assert!(ctx.is_excluded_gap(&rows[1]));
    }

    #[test]
    fn ae_ongoing_suppressed_by_end_date() {
        let rows = vec![
            obs("101-01", "Adverse Event", "LOGS_AE_AEENDTC", "2025-02-10"),
            obs("101-01", "Adverse Event", "LOGS_AE_AEONGO", ""),
        ];
        let ctx = ctx(&rows);
        assert!(ctx.is_excluded_gap(&rows[1]));
    }

    #[test]
    fn echo_sister_form_marks_site_form_started() {
        let core = obs(
            "101-01",
            "Echocardiography \u{2013} Core lab",
            "TV_ECHO_FAORRES_TR_SP",
            "Severe",
        );
        let ctx = ctx(&[core]);
        let site_field = obs("101-01", "Echocardiography", "TV_ECHO_FAORRES_TR", "");
        assert!(ctx.form_has_any_data(&site_field));
    }

    #[test]
    fn ecg_checkbox_requires_rhythm_data() {
        let rhythm = obs("101-01", "Standard 12-lead ECG", "SBV_EGORRES_RHYTHM", "Sinus");
        let checkbox = obs("101-01", "Standard 12-lead ECG", "SBV_EGORRES__ABN_AF", "");
        let ctx = ctx(&[rhythm, checkbox.clone()]);
        assert!(ctx.is_ecg_checkbox(&checkbox));

        let lone = obs("101-01", "Standard 12-lead ECG", "SBV_EGORRES__ABN_AF", "");
        let ctx2 = SuppressionContext::build(std::slice::from_ref(&lone), BTreeSet::new());
        assert!(!ctx2.is_ecg_checkbox(&lone));
    }

    #[test]
    fn generic_stat_fields_always_suppressed() {
        let field = obs("101-01", "Exercise Tolerance (6MWT)", "SBV_6MWT_FTSTAT_SIXMW1", "");
        let ctx = ctx(std::slice::from_ref(&field));
        assert!(ctx.is_excluded_gap(&field));
    }

    #[test]
    fn date_with_result_is_suppressed() {
        let rows = vec![
            obs("101-01", "Biomarkers", "SBV_LB_BM_LBORRES_NTPRO", "812"),
            obs("101-01", "Biomarkers", "SBV_LB_BM_LBDTC", ""),
        ];
        let ctx = ctx(&rows);
        assert!(ctx.is_excluded_gap(&rows[1]));
    }
}
