//! Label dictionary: raw column code → human-readable display label.
//!
//! The wide export and the modular export disagree on column spelling
//! (`SBV_DM_AGE` vs `SBV_AGE`, cross-visit prefixes, double tokens), so
//! the dictionary generates lookup variants up front and keeps a
//! last-two-token suffix index as the final fallback.

use std::collections::{BTreeMap, BTreeSet};

/// Visit prefixes used when generating cross-visit label variants.
/// Must match the classifier's visit table.
const VISIT_PREFIXES: [&str; 11] = [
    "SBV_", "TV_", "DV_", "FU1M_", "FU3M_", "FU6M_", "FU1Y_", "FU2Y_", "FU3Y_", "FU4Y_", "FU5Y_",
];

#[derive(Debug, Clone, Default)]
pub struct LabelDictionary {
    labels: BTreeMap<String, String>,
    suffix_labels: BTreeMap<String, String>,
}

impl LabelDictionary {
    /// Builds the dictionary from verbatim (code, label) pairs and
    /// pre-computes the matching variants.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut labels: BTreeMap<String, String> = BTreeMap::new();
        let verbatim: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_string(), v.into()))
            .collect();
        for (key, label) in &verbatim {
            labels.insert(key.clone(), label.clone());
        }

        for (key, label) in &verbatim {
            let parts: Vec<&str> = key.split('_').collect();
            if parts.len() > 2 {
                // SBV_DM_AGE -> SBV_AGE
                let first_last = format!("{}_{}", parts[0], parts[parts.len() - 1]);
                labels.entry(first_last).or_insert_with(|| label.clone());
                // SBV_SV_SVSTDTC -> SBV_SVSTDTC
                let mut dropped = vec![parts[0]];
                dropped.extend(&parts[2..]);
                labels
                    .entry(dropped.join("_"))
                    .or_insert_with(|| label.clone());
            }
            // SBV_FAORRES_X -> TV_FAORRES_X, DV_FAORRES_X, ...
            for prefix in VISIT_PREFIXES {
                if let Some(suffix) = key.strip_prefix(prefix) {
                    for alt in VISIT_PREFIXES {
                        if alt != prefix {
                            labels
                                .entry(format!("{alt}{suffix}"))
                                .or_insert_with(|| label.clone());
                        }
                    }
                    break;
                }
            }
        }

        // Suffix index over the expanded map: last two underscore tokens.
        let mut suffix_labels = BTreeMap::new();
        for (key, label) in &labels {
            let parts: Vec<&str> = key.split('_').collect();
            if parts.len() >= 2 {
                let suffix = parts[parts.len() - 2..].join("_");
                suffix_labels.entry(suffix).or_insert_with(|| label.clone());
            }
        }

        Self {
            labels,
            suffix_labels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Verbatim/variant lookup only.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.labels.get(code.trim()).map(String::as_str)
    }

    /// Full resolution: variants, then the suffix index, then the code
    /// itself.
    pub fn resolve(&self, code: &str) -> String {
        let code = code.trim();
        if let Some(label) = self.labels.get(code) {
            return label.clone();
        }
        let parts: Vec<&str> = code.split('_').collect();
        if parts.len() >= 2 {
            let suffix = parts[parts.len() - 2..].join("_");
            if let Some(label) = self.suffix_labels.get(&suffix) {
                return label.clone();
            }
        }
        code.to_string()
    }

    /// Display form: resolve plus label cleanup.
    pub fn display(&self, code: &str) -> String {
        clean_label(&self.resolve(code))
    }

    /// Lowercase variable names whose label marks a "not done" /
    /// "not recorded" checkbox. Consumed by the gap classifier.
    pub fn not_done_variables(&self) -> BTreeSet<String> {
        self.labels
            .iter()
            .filter(|(_, label)| {
                let lower = label.to_lowercase();
                lower.contains("not done") || lower.contains("not recorded")
            })
            .map(|(code, _)| code.to_lowercase())
            .collect()
    }
}

/// Strips export artifacts and sponsor prefixes from a display label and
/// shortens a few known verbose ones.
pub fn clean_label(label: &str) -> String {
    let mut text = label.trim().replace("_x0009_", "");
    for prefix in ["Sponsor/", "Sponsor ", "Core Lab/", "Core Lab "] {
        if let Some(stripped) = text.strip_prefix(prefix) {
            text = stripped.to_string();
        }
    }
    let lower = text.to_lowercase();
    if lower.contains("post-treatment hospitalizations") && lower.contains("status") {
        return "Hospitalization Occurred?".to_string();
    }
    if lower.contains("reason for hospitalization") {
        return "Reason".to_string();
    }
    if lower.contains("occurrence of heart failure") {
        return "HF Hospitalization?".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_lookup_wins() {
        let dict = LabelDictionary::from_pairs([("SBV_DM_AGE", "Age")]);
        assert_eq!(dict.get("SBV_DM_AGE"), Some("Age"));
    }

    #[test]
    fn generates_first_last_and_drop_second_variants() {
        let dict = LabelDictionary::from_pairs([("SBV_SV_SVSTDTC", "Visit Date")]);
        assert_eq!(dict.get("SBV_SVSTDTC"), Some("Visit Date"));
    }

    #[test]
    fn cross_visit_variants_cover_all_prefixes() {
        let dict = LabelDictionary::from_pairs([("SBV_VS_VSORRES_HR", "Heart Rate")]);
        assert_eq!(dict.get("FU1Y_VS_VSORRES_HR"), Some("Heart Rate"));
        assert_eq!(dict.get("TV_VS_VSORRES_HR"), Some("Heart Rate"));
    }

    #[test]
    fn suffix_fallback_is_last_resort() {
        let dict = LabelDictionary::from_pairs([("SBV_ECHO_FAORRES_HR", "Heart Rate (Echo)")]);
        assert_eq!(dict.resolve("UV_XX_FAORRES_HR"), "Heart Rate (Echo)");
        assert_eq!(dict.resolve("UNKNOWN"), "UNKNOWN");
    }

    #[test]
    fn label_cleanup() {
        assert_eq!(clean_label("Core Lab/TR Severity"), "TR Severity");
        assert_eq!(
            clean_label("Post-Treatment Hospitalizations / Status of event"),
            "Hospitalization Occurred?"
        );
    }

    #[test]
    fn not_done_variables_are_lowercased() {
        let dict = LabelDictionary::from_pairs([
            ("SBV_VS_VSSTAT", "Vital Signs Not Done"),
            ("SBV_VS_VSORRES_HR", "Heart Rate"),
        ]);
        let vars = dict.not_done_variables();
        assert!(vars.contains("sbv_vs_vsstat"));
        assert!(!vars.contains("sbv_vs_vsorres_hr"));
    }
}
