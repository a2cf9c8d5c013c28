//! Repeating-group extraction from pipe-delimited wide columns.
//!
//! Event-log forms (adverse events, medications, history entries) land in
//! the wide export as pipe-joined multi-value cells: the base column
//! carries `"termA|termB|termC"` and each sibling attribute column carries
//! a parallel list. Records are reconstructed positionally: segment *i*
//! of every sibling belongs to record *i*, and short sibling lists pad
//! with empty strings rather than erroring.

use std::collections::BTreeMap;

use sdv_model::is_real_value;

use crate::datetime::clean_date;

/// Splits a pipe-delimited cell into trimmed segments, mapping null
/// sentinels to empty strings. A blank cell yields no segments.
pub fn split_multi(cell: &str) -> Vec<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('|')
        .map(|segment| {
            let segment = segment.trim();
            if is_real_value(segment) {
                segment.to_string()
            } else {
                String::new()
            }
        })
        .collect()
}

/// Segment `idx` of a pre-split list, empty when the list is short.
fn segment(values: &[String], idx: usize) -> String {
    values.get(idx).cloned().unwrap_or_default()
}

/// How a sibling column participates in record reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiblingRole {
    Value,
    /// Run through [`clean_date`].
    Date,
    /// Date that becomes the literal `"Ongoing"` when the record's
    /// ongoing flag is checked.
    EndDate,
    /// Checkbox controlling the paired end date.
    Ongoing,
    /// Unit whose literal value `"Other"` is replaced from the parallel
    /// other-unit column, when one exists.
    Unit {
        other_cell: Option<String>,
    },
}

/// One sibling attribute of a repeating group.
#[derive(Debug, Clone)]
pub struct Sibling {
    pub label: String,
    pub cell: String,
    pub role: SiblingRole,
}

impl Sibling {
    pub fn new(label: impl Into<String>, cell: impl Into<String>, role: SiblingRole) -> Self {
        Self {
            label: label.into(),
            cell: cell.into(),
            role,
        }
    }
}

/// One reconstructed record of a repeating group.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingRecord {
    /// 1-based instance number.
    pub number: usize,
    pub base: String,
    pub attributes: BTreeMap<String, String>,
}

impl RepeatingRecord {
    pub fn attribute(&self, label: &str) -> &str {
        self.attributes.get(label).map_or("", String::as_str)
    }
}

/// True when a checkbox-style cell is checked.
pub fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "y" | "1" | "true" | "checked"
    )
}

/// Reconstructs one record per non-empty base segment, aligning sibling
/// segments by position.
pub fn parse_repeating_group(base_cell: &str, siblings: &[Sibling]) -> Vec<RepeatingRecord> {
    let base_values = split_multi(base_cell);
    let split_siblings: Vec<(usize, Vec<String>)> = siblings
        .iter()
        .enumerate()
        .map(|(pos, sibling)| (pos, split_multi(&sibling.cell)))
        .collect();

    let mut records = Vec::new();
    for (idx, base) in base_values.iter().enumerate() {
        if base.is_empty() {
            continue;
        }
        let mut attributes = BTreeMap::new();
        let mut ongoing = false;
        for (pos, values) in &split_siblings {
            let sibling = &siblings[*pos];
            let mut value = segment(values, idx);
            match &sibling.role {
                SiblingRole::Value => {}
                SiblingRole::Date | SiblingRole::EndDate => {
                    if !value.is_empty() {
                        value = clean_date(&value);
                    }
                }
                SiblingRole::Ongoing => {
                    ongoing = is_checked(&value);
                }
                SiblingRole::Unit { other_cell } => {
                    if value.eq_ignore_ascii_case("other") {
                        if let Some(other) = other_cell {
                            let other_value = segment(&split_multi(other), idx);
                            if !other_value.is_empty() {
                                value = other_value;
                            }
                        }
                    }
                }
            }
            attributes.insert(sibling.label.clone(), value);
        }
        if ongoing {
            for (pos, _) in &split_siblings {
                let sibling = &siblings[*pos];
                if sibling.role == SiblingRole::EndDate {
                    attributes.insert(sibling.label.clone(), "Ongoing".to_string());
                }
            }
        }
        records.push(RepeatingRecord {
            number: records.len() + 1,
            base: base.clone(),
            attributes,
        });
    }
    records
}

/// Outcome of frequency-code interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyDose {
    /// Doses per day; None when no per-day rate exists (PRN, continuous).
    pub multiplier: Option<f64>,
    /// Display annotation, e.g. "(every 48h)" or "PRN".
    pub note: String,
    /// Total daily dose override when the free text spells out amounts.
    pub override_daily: Option<f64>,
}

impl FrequencyDose {
    fn per_day(multiplier: f64) -> Self {
        Self {
            multiplier: Some(multiplier),
            note: String::new(),
            override_daily: None,
        }
    }

    fn noted(multiplier: Option<f64>, note: impl Into<String>) -> Self {
        Self {
            multiplier,
            note: note.into(),
            override_daily: None,
        }
    }
}

static MG_AMOUNT_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"(\d+(?:\.\d+)?)\s*mg").expect("mg amount pattern")
});
static Q_HOURS_RE: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"^q\s*(\d+)\s*h").expect("qNh pattern"));

/// Maps a dosing-frequency code to a per-day multiplier. Unmapped codes
/// pass through with multiplier 1 and no note; the "Other" code inspects
/// the free-text companion value.
pub fn parse_frequency_multiplier(freq: &str, freq_other: &str) -> FrequencyDose {
    let trimmed = freq.trim().to_lowercase();
    if trimmed.is_empty() || trimmed == "nan" || trimmed == "none" {
        return FrequencyDose::per_day(1.0);
    }
    match trimmed.as_str() {
        "once a day" | "qd" | "od" => FrequencyDose::per_day(1.0),
        "twice a day" | "bid" => FrequencyDose::per_day(2.0),
        "3 times a day" | "tid" => FrequencyDose::per_day(3.0),
        "4 times a day" | "qid" => FrequencyDose::per_day(4.0),
        "every other day" | "qod" => FrequencyDose::noted(Some(0.5), "(every 48h)"),
        "as needed" => FrequencyDose::noted(None, "PRN"),
        "once" => FrequencyDose::noted(Some(1.0), "(single dose)"),
        "other" => parse_other_frequency(freq_other),
        _ => FrequencyDose::per_day(1.0),
    }
}

fn parse_other_frequency(freq_other: &str) -> FrequencyDose {
    let raw = freq_other.trim();
    let lower = raw.to_lowercase();
    if raw.is_empty() || lower == "nan" || lower == "none" {
        return FrequencyDose::per_day(1.0);
    }

    // "40 mg morning, 20 mg evening" - explicit amounts sum to a daily dose
    let amounts: Vec<f64> = MG_AMOUNT_RE
        .captures_iter(&lower)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .collect();
    if amounts.len() > 1 {
        return FrequencyDose {
            multiplier: None,
            note: format!("({raw})"),
            override_daily: Some(amounts.iter().sum()),
        };
    }

    if lower.contains("every other day") || lower.contains("qod") {
        return FrequencyDose::noted(Some(0.5), "(every 48h)");
    }

    if let Some(caps) = Q_HOURS_RE.captures(&lower) {
        if let Ok(interval) = caps[1].parse::<u32>() {
            if interval > 0 {
                let doses = f64::from(24 / interval);
                return FrequencyDose::noted(
                    Some(doses),
                    format!("(q{interval}h->{}x/d)", 24 / interval),
                );
            }
        }
    }

    if lower.contains("continuous") {
        return FrequencyDose::noted(None, "(continuous)");
    }

    FrequencyDose::noted(Some(1.0), format!("({raw})"))
}

/// Formats a per-day dose for display: `"20 mg/day"`, or the single dose
/// with the frequency note when no daily rate exists.
pub fn format_daily_dose(dose: &str, freq: &FrequencyDose, unit: &str) -> Option<String> {
    let single: f64 = dose.trim().parse().ok()?;
    let daily = freq
        .override_daily
        .or_else(|| freq.multiplier.map(|m| single * m));

    let render = |value: f64| {
        if value.fract() == 0.0 {
            format!("{}", value as i64)
        } else {
            format!("{value:.1}")
        }
    };

    match daily {
        Some(daily) => {
            let mut text = render(daily);
            let unit = unit.trim();
            if !unit.is_empty() && !unit.eq_ignore_ascii_case("nan") && !unit.eq_ignore_ascii_case("none") {
                let unit = if unit.to_lowercase().contains("milligram") {
                    "mg"
                } else {
                    unit
                };
                text.push_str(&format!(" {unit}/day"));
            } else {
                text.push_str("/day");
            }
            Some(text)
        }
        None if !freq.note.is_empty() => Some(format!("{} {}", render(single), freq.note)),
        None => None,
    }
}
