//! Verification index over the status-history log.
//!
//! The log records every form-status event: data entry, submission,
//! verification, approval, locking. Two different facts are derived per
//! (patient, visit, form, repeat) key and must not be conflated:
//!
//! - the *current* form status - the most recent row by timestamp;
//! - the *verification event* - who verified and when, isolated from
//!   later approval events by a two-state transition scan over the
//!   chronologically sorted rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use sdv_ingest::HistoryRow;
use sdv_model::{DataEntryStatus, FormStatusEntry, VerificationDetails, VerificationEvent};

use crate::datetime::{format_timestamp, parse_history_timestamp};

/// Status strings that mean "verified". Any string containing
/// `NotYetVerified` is never verified regardless of other matches.
const VERIFIED_KEYWORDS: [&str; 4] = [
    "Verified",
    "Verified by a single action",
    "Re-verified",
    "Re-verified by a single action",
];

/// Exact current-status strings that mark a whole form as verified.
const STRICT_VERIFIED_STATUSES: [&str; 3] = ["Verified", "SDV Verified", "DMR Verified"];

/// Verification statuses that count as blank for "not sent" purposes.
const BLANK_STATUSES: [&str; 4] = ["Blank", "nan", "None", ""];

/// Display-name aliases that resolve to a shared canonical form name.
/// Both sides are compared after [`canonical_form`] normalization.
const FORM_ALIASES: [(&str, &str); 4] = [
    ("echo core lab", "echocardiography - core lab"),
    ("echo - core lab", "echocardiography - core lab"),
    ("echo", "echocardiography"),
    ("vitals", "vital signs"),
];

pub fn is_verified_status(status: &str) -> bool {
    if status.contains("NotYetVerified") {
        return false;
    }
    VERIFIED_KEYWORDS.iter().any(|keyword| status.contains(keyword))
}

fn is_blank_status(status: &str) -> bool {
    BLANK_STATUSES.iter().any(|blank| status.trim() == *blank)
}

/// Lowercases, unifies dash variants, and collapses runs of whitespace so
/// display names from different exports compare equal.
fn canonical_form(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace(['\u{2013}', '\u{2014}'], "-");
    let mut out = String::with_capacity(lowered.len());
    let mut last_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn aliased_form(canonical: &str) -> String {
    for (alias, target) in FORM_ALIASES {
        if canonical == alias {
            return target.to_string();
        }
    }
    canonical.to_string()
}

/// Exact → substring either direction → shared canonical alias.
fn forms_match(key_form: &str, wanted: &str) -> bool {
    let key = canonical_form(key_form);
    let want = canonical_form(wanted);
    if key == want || key.contains(&want) || want.contains(&key) {
        return true;
    }
    aliased_form(&key) == aliased_form(&want)
}

/// Visit names match loosely: "Screening/Baseline" matches "Screening".
fn visits_match(key_visit: &str, wanted: &str) -> bool {
    let key = key_visit.trim().to_lowercase();
    let want = wanted.trim().to_lowercase();
    key == want || key.contains(&want) || want.contains(&key)
}

/// Derives the form code from a field identifier following the
/// `{visit}_{form}_{field}` convention (`LOGS_AE_AETERM` → `AE`), or
/// `{form}_{field}` when no visit prefix is present.
pub fn derive_form_code(field_id: &str) -> Option<&str> {
    let mut parts = field_id.split('_');
    let first = parts.next()?;
    let second = parts.next();
    let is_visit_prefix = crate::columns::VISIT_TABLE
        .iter()
        .any(|(prefix, _)| *prefix == first);
    if is_visit_prefix { second } else { Some(first) }
}

/// Lowercased lookup key for one (patient, form, visit, repeat) tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormKey {
    pub patient: String,
    pub form: String,
    pub visit: String,
    pub repeat: String,
}

impl FormKey {
    pub fn new(patient: &str, form: &str, visit: &str, repeat: &str) -> Self {
        Self {
            patient: patient.trim().to_lowercase(),
            form: form.trim().to_lowercase(),
            visit: visit.trim().to_lowercase(),
            repeat: repeat.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    patient: String,
    visit: String,
    form: String,
    repeat: String,
    entry: FormStatusEntry,
    event: Option<VerificationEvent>,
}

/// Index of form-status entries and verification events built from the
/// status-history log. Rebuilt wholesale on every load.
#[derive(Debug, Default)]
pub struct VerificationIndex {
    entries: Vec<IndexedEntry>,
    /// patient (lowercase) → indexes into `entries`.
    by_patient: BTreeMap<String, Vec<usize>>,
}

impl VerificationIndex {
    /// Builds the index from history rows. Rows whose timestamp cannot be
    /// parsed are dropped (warned once with a count).
    pub fn build(rows: &[HistoryRow]) -> Self {
        let mut groups: BTreeMap<(String, String, String, String), Vec<(NaiveDateTime, usize)>> =
            BTreeMap::new();
        let mut dropped = 0usize;
        for (idx, row) in rows.iter().enumerate() {
            let Some(timestamp) = parse_history_timestamp(&row.date, &row.time) else {
                dropped += 1;
                continue;
            };
            groups
                .entry((
                    row.patient.clone(),
                    row.activity.clone(),
                    row.form.clone(),
                    row.repeat.clone(),
                ))
                .or_default()
                .push((timestamp, idx));
        }
        if dropped > 0 {
            warn!(dropped, "history rows with unparseable timestamps skipped");
        }

        let mut entries = Vec::with_capacity(groups.len());
        let mut by_patient: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for ((patient, activity, form, repeat), mut group) in groups {
            group.sort_by_key(|(ts, idx)| (*ts, *idx));

            let (last_ts, last_idx) = group[group.len() - 1];
            let last = &rows[last_idx];
            let entry = FormStatusEntry {
                data_entry_status: DataEntryStatus::parse(&last.data_entry_status),
                verification_status: last.verification_status.clone(),
                user: last.user.clone(),
                timestamp: format_timestamp(last_ts),
            };

            // Transition scan: a row is a verification event only when the
            // previous row was not already in the verified state.
            let mut event = None;
            let mut prev_verified = false;
            for (ts, idx) in &group {
                let current = is_verified_status(&rows[*idx].verification_status);
                if current && !prev_verified {
                    event = Some(VerificationEvent {
                        user: rows[*idx].user.clone(),
                        timestamp: format_timestamp(*ts),
                    });
                }
                prev_verified = current;
            }

            let slot = entries.len();
            by_patient
                .entry(patient.to_lowercase())
                .or_default()
                .push(slot);
            entries.push(IndexedEntry {
                patient,
                visit: activity,
                form,
                repeat,
                entry,
                event,
            });
        }
        debug!(keys = entries.len(), "verification index built");
        Self { entries, by_patient }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matching_entries<'a>(
        &'a self,
        patient_id: &str,
        form_name: &str,
        visit_name: Option<&str>,
        repeat: Option<&str>,
    ) -> impl Iterator<Item = &'a IndexedEntry> {
        let wanted_form = form_name.trim().to_string();
        let wanted_visit = visit_name.map(|visit| visit.trim().to_string());
        let wanted_repeat = repeat
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "0".to_string());
        let form_code = derive_form_code(&wanted_form).map(str::to_lowercase);

        self.by_patient
            .get(&patient_id.trim().to_lowercase())
            .map(|slots| slots.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|slot| &self.entries[*slot])
            .filter(move |candidate| {
                let name_match = forms_match(&candidate.form, &wanted_form)
                    || form_code.as_deref().is_some_and(|code| {
                        !code.is_empty() && candidate.form.to_lowercase().contains(code)
                    });
                if !name_match {
                    return false;
                }
                if candidate.repeat != wanted_repeat && wanted_repeat != "0" {
                    return false;
                }
                match &wanted_visit {
                    Some(visit) if !visit.is_empty() => visits_match(&candidate.visit, visit),
                    _ => true,
                }
            })
    }

    /// True when the form was never submitted: most recent entry status is
    /// `Created` with a blank verification status.
    pub fn is_form_not_sent(
        &self,
        patient_id: &str,
        form_name: &str,
        visit_name: Option<&str>,
        repeat: Option<&str>,
    ) -> bool {
        self.matching_entries(patient_id, form_name, visit_name, repeat)
            .any(|candidate| {
                candidate.entry.data_entry_status.is_created()
                    && is_blank_status(&candidate.entry.verification_status)
            })
    }

    /// Verification metadata for a form, preferring the isolated
    /// verification event. Falls back to the current-status row only when
    /// that row is itself strictly verified, so a data-entry user is never
    /// reported as the verifier.
    pub fn verification_details(
        &self,
        patient_id: &str,
        form_name: &str,
        visit_name: Option<&str>,
        repeat: Option<&str>,
    ) -> Option<VerificationDetails> {
        for candidate in self.matching_entries(patient_id, form_name, visit_name, repeat) {
            if let Some(event) = &candidate.event {
                return Some(VerificationDetails {
                    user: event.user.clone(),
                    date: event.timestamp.clone(),
                    status: candidate.entry.verification_status.clone(),
                });
            }
            let status = candidate.entry.verification_status.trim();
            let strictly_verified = STRICT_VERIFIED_STATUSES.contains(&status)
                || (status.contains("Verified") && !status.contains("NotYetVerified"));
            if strictly_verified {
                return Some(VerificationDetails {
                    user: candidate.entry.user.clone(),
                    date: candidate.entry.timestamp.clone(),
                    status: status.to_string(),
                });
            }
            return None;
        }
        None
    }

    /// Keys of forms never submitted to the monitor.
    pub fn not_sent_keys(&self) -> BTreeSet<FormKey> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.entry.data_entry_status.is_created()
                    && is_blank_status(&entry.entry.verification_status)
            })
            .map(|entry| FormKey::new(&entry.patient, &entry.form, &entry.visit, &entry.repeat))
            .collect()
    }

    /// Keys of forms whose current verification status marks the whole
    /// form verified.
    pub fn verified_form_keys(&self) -> BTreeSet<FormKey> {
        self.entries
            .iter()
            .filter(|entry| {
                STRICT_VERIFIED_STATUSES.contains(&entry.entry.verification_status.trim())
            })
            .map(|entry| FormKey::new(&entry.patient, &entry.form, &entry.visit, &entry.repeat))
            .collect()
    }

    /// The raw verification event for an exact key, mostly for tests.
    pub fn event_for(
        &self,
        patient: &str,
        visit: &str,
        form: &str,
        repeat: &str,
    ) -> Option<&VerificationEvent> {
        self.entries
            .iter()
            .find(|entry| {
                entry.patient == patient
                    && entry.visit == visit
                    && entry.form == form
                    && entry.repeat == repeat
            })
            .and_then(|entry| entry.event.as_ref())
    }
}

/// One line of the monitor-activity report: unique form pages verified by
/// a user on a day, per patient and visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorActivity {
    pub user: String,
    pub date: String,
    pub site: String,
    pub patient: String,
    pub visit: String,
    pub pages_verified: usize,
}

/// Aggregates verification events from the raw history into per-day
/// monitor activity. `user_filter` of `None` (or "All") keeps everyone.
pub fn monitor_activity(
    rows: &[HistoryRow],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    user_filter: Option<&str>,
) -> Vec<MonitorActivity> {
    let mut pages: BTreeSet<(String, String, String, String, String, String)> = BTreeSet::new();
    for row in rows {
        if !VERIFIED_KEYWORDS.contains(&row.verification_status.trim()) {
            continue;
        }
        let Some(timestamp) = parse_history_timestamp(&row.date, &row.time) else {
            continue;
        };
        let day = timestamp.date();
        if start.is_some_and(|from| day < from) || end.is_some_and(|to| day > to) {
            continue;
        }
        if let Some(user) = user_filter {
            if user != "All" && row.user != user {
                continue;
            }
        }
        pages.insert((
            row.user.clone(),
            day.format("%Y-%m-%d").to_string(),
            row.site.clone(),
            row.patient.clone(),
            row.activity.clone(),
            row.form.clone(),
        ));
    }

    let mut counts: BTreeMap<(String, String, String, String, String), usize> = BTreeMap::new();
    for (user, day, site, patient, visit, _form) in pages {
        *counts.entry((user, day, site, patient, visit)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((user, date, site, patient, visit), pages_verified)| MonitorActivity {
            user,
            date,
            site,
            patient,
            visit,
            pages_verified,
        })
        .collect()
}
