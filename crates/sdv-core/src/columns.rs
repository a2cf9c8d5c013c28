//! Column-name classification: raw column code → (visit, form, category).
//!
//! Resolution is table-driven. The visit table is an ordered prefix list;
//! the form table is an ordered list of regex rules where the FIRST match
//! wins. Rule order is load-bearing: several patterns match the same
//! column and only the most specific may win (procedure timing before
//! ECG/catheterization, core-lab echo before site echo).

use std::collections::BTreeSet;

use regex::Regex;

/// Ordered visit-prefix table. First prefix whose `{prefix}_` leads the
/// column name wins.
pub const VISIT_TABLE: [(&str, &str); 13] = [
    ("SBV", "Baseline"),
    ("TV", "Treatment"),
    ("DV", "Discharge Visit"),
    ("FU1M", "30-Day Follow Up"),
    ("FU3M", "3-Month Follow Up (Remote)"),
    ("FU6M", "6-Month Follow Up"),
    ("FU1Y", "1-Year Follow Up"),
    ("FU2Y", "2-Year Follow Up"),
    ("FU3Y", "3-Year Follow Up (Remote)"),
    ("FU4Y", "4-Year Follow Up"),
    ("FU5Y", "5-Year Follow Up (Remote)"),
    ("UV", "Unscheduled"),
    ("LOGS", "Logs"),
];

/// Visit label used when no prefix matches.
pub const UNSCHEDULED_VISIT: &str = "Unscheduled";

/// (pattern, category, form) - order encodes precedence.
const ASSESSMENT_RULES: [(&str, &str, &str); 62] = [
    // Additional tests use specific pattern prefixes, checked first
    ("LOGS_LB_PR_OTH_PRORRES", "Procedures", "Additional Laboratory / Diagnostic Tests"),
    ("LOGS_LB_PR_OTH_ORRES", "Laboratory", "Additional Laboratory / Diagnostic Tests"),
    ("LOGS_LB_PR_OTH_LBORRES", "Laboratory", "Additional Laboratory / Diagnostic Tests"),
    ("LOGS_AE_LBREF", "Laboratory", "Additional Laboratory / Diagnostic Tests"),
    ("LOGS_AE_PRREF", "Procedures", "Additional Laboratory / Diagnostic Tests"),
    // Admin
    ("ELIG", "Admin", "Eligibility Confirmation and Planned Procedure Date"),
    ("IE", "Admin", "Inclusion/Exclusion Criteria"),
    ("ICF", "Admin", "ICF procedure"),
    ("_SV_", "Admin", "Visit Date"),
    // Procedures - timing must be resolved before ECG/CVC
    ("_PR_TIM_", "Procedures", "Procedure form"),
    ("CVC.*PRE|CVC.*POST", "Procedures", "Cardiac and Venous Catheterization – Pre- and Post-procedure"),
    ("CVC", "Procedures", "Cardiac and Venous Catheterization"),
    ("TV_.*ECG.*POST", "Procedures", "Standard 12-lead ECG-Pre and Post procedure"),
    ("TV_.*ECG.*PRE", "Procedures", "Standard 12-lead ECG-Pre and Post procedure"),
    ("ECG", "Procedures", "Standard 12-lead ECG"),
    ("TRRI", "Procedures", "Tricuspid Re-intervention"),
    ("CVPHM", "Procedures", "CVP Hemodynamic Measurement"),
    ("_PR_", "Procedures", "Procedure form"),
    // Imaging - core lab (with _SP or _CORE suffix) before site forms
    ("TV_.*ECHO.*1DPP.*(_SP|_CORE)", "Imaging (Core Lab)", "Echocardiography – 1 day prior the procedure - Core lab"),
    ("TV_.*ECHO.*1D.*(_SP|_CORE)", "Imaging (Core Lab)", "Echocardiography – 1-day post procedure - Core lab"),
    ("TV_.*ECHO.*(PRE|POST).*(_SP|_CORE)", "Imaging (Core Lab)", "Echocardiography – Pre and Post procedure - Core lab"),
    ("TV_.*ECHO.*(_SP|_CORE)", "Imaging (Core Lab)", "Echocardiography – Core lab"),
    ("ECHO.*(_SP|_CORE)", "Imaging (Core Lab)", "Echocardiography – Core lab"),
    ("ECHO.*SPONSOR", "Imaging (Core Lab)", "Echocardiography – Core lab"),
    // Imaging - site
    ("TV_.*ECHO.*1DPP", "Imaging (Site)", "Echocardiography – 1 day prior the procedure"),
    ("TV_.*ECHO.*1D", "Imaging (Site)", "Echocardiography – 1-day post procedure"),
    ("TV_.*ECHO.*(PRE|POST)", "Imaging (Site)", "Echocardiography – Pre and Post procedure"),
    ("TV_.*ECHO", "Imaging (Site)", "Echocardiography"),
    ("ECHO", "Imaging (Site)", "Echocardiography"),
    ("_AG_", "Imaging (Site)", "Angiography – Pre and Post procedure"),
    ("CMR", "Imaging", "CMR Imaging"),
    ("CCTA", "Imaging", "Cardiac CT Angiogram"),
    // Clinical assessments
    ("HE_GRADE|ENCEPH|LFP_HE|RS_EG", "Clinical Assessments", "Encephalopathy Grade"),
    ("_VS", "Clinical Assessments", "Vital signs"),
    ("_PE", "Clinical Assessments", "Physical Examination"),
    ("6MWT", "Clinical Assessments", "Exercise Tolerance (6MWT)"),
    ("CFSS", "Clinical Assessments", "Clinical Frailty Scale"),
    ("_FS_", "Clinical Assessments", "Functional Status (NYHA)"),
    ("MNA", "Clinical Assessments", "Mini Nutrition Assessment (MNA)"),
    ("KCCQ", "Questionnaires", "Kansas City Cardiomyopathy Questionnaire (KCCQ)"),
    ("RS_PGA", "Clinical Assessments", "Physician Global Assessment"),
    // Laboratory panels
    ("LB_CBC", "Laboratory", "CBC and platelets count"),
    ("LB_BMP", "Laboratory", "Basic metabolic panel and eGFR CKD-EPI (2021)"),
    ("LB_LFP", "Laboratory", "Liver function panel"),
    ("LB_COA", "Laboratory", "Coagulation study"),
    ("LB_ENZ", "Laboratory", "Blood enzymes"),
    ("LB_PREG", "Laboratory", "Pregnancy test"),
    ("LB_BM", "Laboratory", "Biomarkers"),
    ("LB_ACT", "Laboratory", "ACT lab results"),
    ("LB_ADD", "Laboratory", "Additional Laboratory / Diagnostic Tests"),
    // History
    ("_DM", "History", "Demographics"),
    ("_MH", "History", "Medical History"),
    ("_CVH", "History", "Cardiovascular History"),
    ("_HFH", "History", "Heart Failure History"),
    ("HMEH", "History", "Hospitalization and Medical Events History"),
    // Risk scores
    ("TRS", "Risk Scores", "Trio Score for Tricuspid Regurgitation Risk"),
    ("STSS", "Risk Scores", "Society of Thoracic Surgeons Score"),
    // Safety
    ("_DDF", "Safety", "Device Deficiency Form"),
    ("_AE|AEACN", "Safety", "Adverse Event"),
    ("_CM", "Safety", "Concomitant Medications"),
    ("PTHME", "Safety", "Post-Treatment Hospitalizations/Medical Events"),
    ("DTF|DEATH|DTH", "Safety", "Death"),
];

/// Classification of one raw column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnClass {
    pub visit: String,
    pub form: String,
    pub category: String,
}

struct AssessmentRule {
    pattern: Regex,
    category: &'static str,
    form: &'static str,
}

/// Ordered-rule classifier. Pure and total: every column name resolves
/// to some (visit, form, category).
pub struct ColumnClassifier {
    rules: Vec<AssessmentRule>,
}

impl ColumnClassifier {
    /// Builds the standard rule table. Patterns are fixed at compile
    /// time; an invalid pattern is a programmer error surfaced by the
    /// table tests.
    pub fn standard() -> Self {
        let rules = ASSESSMENT_RULES
            .iter()
            .map(|&(pattern, category, form)| AssessmentRule {
                pattern: Regex::new(pattern).expect("assessment rule pattern"),
                category,
                form,
            })
            .collect();
        Self { rules }
    }

    /// Resolves the visit label from the column's prefix.
    pub fn visit_for(column_name: &str) -> &'static str {
        for (prefix, label) in VISIT_TABLE {
            if column_name == prefix
                || (column_name.starts_with(prefix)
                    && column_name.as_bytes().get(prefix.len()) == Some(&b'_'))
            {
                return label;
            }
        }
        UNSCHEDULED_VISIT
    }

    /// First-match-wins classification. Unmatched columns land in
    /// category "Other", form "General".
    pub fn classify(&self, column_name: &str) -> ColumnClass {
        let visit = Self::visit_for(column_name).to_string();
        for rule in &self.rules {
            if rule.pattern.is_match(column_name) {
                return ColumnClass {
                    visit,
                    form: rule.form.to_string(),
                    category: rule.category.to_string(),
                };
            }
        }
        ColumnClass {
            visit,
            form: "General".to_string(),
            category: "Other".to_string(),
        }
    }

    /// Distinct form names in the rule table, for filter lists.
    pub fn form_names(&self) -> BTreeSet<&'static str> {
        self.rules.iter().map(|rule| rule.form).collect()
    }
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

/// Trigger semantics of a conditional-skip rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipTrigger {
    /// Fires on any non-empty trigger value.
    AnyValue,
    /// Fires when the trigger value contains the given text
    /// (case-insensitive).
    Contains(&'static str),
}

/// One conditional-skip rule: when the trigger field carries the trigger
/// value on a subject row, the target fields are suppressed from the
/// display tree.
#[derive(Debug, Clone)]
pub struct SkipRule {
    pub trigger: &'static str,
    pub condition: SkipTrigger,
    pub targets: &'static [&'static str],
}

const CONDITIONAL_SKIPS: [SkipRule; 19] = [
    SkipRule { trigger: "FTORRES_COMPL", condition: SkipTrigger::Contains("completed"), targets: &["REASNC", "REASND"] },
    SkipRule { trigger: "FTORRES_INC", condition: SkipTrigger::Contains("yes"), targets: &["INCD"] },
    SkipRule { trigger: "PESTAT", condition: SkipTrigger::Contains("yes"), targets: &["REASND"] },
    SkipRule { trigger: "VSSTAT", condition: SkipTrigger::Contains("yes"), targets: &["REASND"] },
    SkipRule { trigger: "RSSTAT", condition: SkipTrigger::Contains("yes"), targets: &["REASND"] },
    SkipRule { trigger: "QSSTAT", condition: SkipTrigger::Contains("yes"), targets: &["REASND"] },
    SkipRule { trigger: "PERF", condition: SkipTrigger::Contains("yes"), targets: &["REASND"] },
    // A full date of birth makes the partial/year-only fields redundant
    SkipRule { trigger: "BRTHDAT", condition: SkipTrigger::AnyValue, targets: &["BRTHYR", "AGE_YR", "DOB_YR", "PARTIAL", "BRTHDAT_YEAR", "BRTHDAT_PARTIAL"] },
    // Childbearing potential is collected for females only
    SkipRule { trigger: "SEX", condition: SkipTrigger::Contains("male"), targets: &["CHILDPOT", "F_CHILDPOT", "NFFORRS_F"] },
    SkipRule { trigger: "RACE", condition: SkipTrigger::AnyValue, targets: &["RACE_AIAN", "RACE_ASIA", "RACE_BLAA", "RACE_NHPI", "RACE_WHIT", "RACE_OTH"] },
    SkipRule { trigger: "ETHNIC", condition: SkipTrigger::AnyValue, targets: &["ETHNIC_OTH"] },
    // A vital-signs result makes the per-parameter "not done" flag moot
    SkipRule { trigger: "VSORRES", condition: SkipTrigger::AnyValue, targets: &["VSSTAT"] },
    SkipRule { trigger: "VSORRES_RISP", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_RISP"] },
    SkipRule { trigger: "VSORRES_HR", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_HR"] },
    SkipRule { trigger: "VSORRES_TEMP", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_TEMP"] },
    SkipRule { trigger: "VSORRES_DIABP", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_DIABP"] },
    SkipRule { trigger: "VSORRES_SYSBP", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_SYSBP"] },
    SkipRule { trigger: "VSORRES_WEIGHT", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_WEIGHT"] },
    SkipRule { trigger: "VSORRES_HEIGHT", condition: SkipTrigger::AnyValue, targets: &["VSSTAT_HEIGHT"] },
];

/// Conditional display-suppression table.
pub struct ConditionalSkips;

impl ConditionalSkips {
    pub fn rules() -> &'static [SkipRule] {
        &CONDITIONAL_SKIPS
    }

    /// Whether `column` should be skipped on a row, given a resolver that
    /// returns the value of the column matching a trigger suffix.
    pub fn is_skipped<F>(column: &str, resolve_trigger: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        for rule in &CONDITIONAL_SKIPS {
            let targeted = rule
                .targets
                .iter()
                .any(|target| column == *target || column.ends_with(&format!("_{target}")));
            if !targeted {
                continue;
            }
            let Some(trigger_value) = resolve_trigger(rule.trigger) else {
                continue;
            };
            let value = trigger_value.trim().to_lowercase();
            if value.is_empty() || value == "nan" {
                continue;
            }
            match rule.condition {
                SkipTrigger::AnyValue => return true,
                SkipTrigger::Contains(needle) => {
                    if value.contains(needle) {
                        return true;
                    }
                }
            }
        }
        false
    }
}
