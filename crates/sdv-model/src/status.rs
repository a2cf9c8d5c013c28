//! Status code vocabularies shared across the engine.
//!
//! Two layers of status exist and must not be conflated:
//!
//! - [`FieldStatus`] is the per-field display status derived from the raw
//!   EDC control code plus the hidden flag and value presence.
//! - [`Metric`] is the aggregation-level verdict (Not Sent / Verified /
//!   Pending / Gap) used for gap statistics and drill-down.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw `CRA_CONTROL_STATUS` code carried by the modular export.
///
/// Codes outside the known set behave like `Blank` rather than failing;
/// clinical exports occasionally carry codes from newer EDC releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawStatus {
    /// 0 - no monitor action recorded yet.
    Blank,
    /// 1 - field changed since last verification.
    Changed,
    /// 2 - manually verified by a monitor.
    Verified,
    /// 3 - awaiting re-verification after a data change.
    AwaitingReverification,
    /// 4 - auto-verified by the EDC system.
    AutoVerified,
}

impl RawStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Changed,
            2 => Self::Verified,
            3 => Self::AwaitingReverification,
            4 => Self::AutoVerified,
            _ => Self::Blank,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Blank => 0,
            Self::Changed => 1,
            Self::Verified => 2,
            Self::AwaitingReverification => 3,
            Self::AutoVerified => 4,
        }
    }

    /// Verified for aggregation purposes (manual or auto).
    pub fn is_verified(self) -> bool {
        matches!(self, Self::Verified | Self::AutoVerified)
    }

    /// Implicitly pending regardless of value presence.
    pub fn is_pending_code(self) -> bool {
        matches!(self, Self::Changed | Self::AwaitingReverification)
    }
}

/// Per-field display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldStatus {
    Hidden,
    NotSent,
    Pending,
    Verified,
    AutoVerified,
    Awaiting,
}

impl FieldStatus {
    /// Counts as verified in roll-up statistics.
    pub fn counts_as_verified(self) -> bool {
        matches!(self, Self::Verified | Self::AutoVerified)
    }
}

/// Aggregation-level verdict for one classified field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    /// "NS" - the form was never submitted to the monitor.
    NotSent,
    /// "V" - verified (manual or auto).
    Verified,
    /// "!" - present but unverified, or suppressed-from-gap for review.
    Pending,
    /// "GAP" - genuinely missing data.
    Gap,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::NotSent, Metric::Verified, Metric::Pending, Metric::Gap];

    pub fn code(self) -> &'static str {
        match self {
            Self::NotSent => "NS",
            Self::Verified => "V",
            Self::Pending => "!",
            Self::Gap => "GAP",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NS" => Some(Self::NotSent),
            "V" => Some(Self::Verified),
            "!" => Some(Self::Pending),
            "GAP" => Some(Self::Gap),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Form-level data-entry state from the status-history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEntryStatus {
    /// The form exists in the EDC but was never submitted.
    Created,
    EntryCompleted,
    /// Any other raw status string, passed through verbatim.
    Other(String),
}

impl DataEntryStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Created" => Self::Created,
            "EntryCompleted" => Self::EntryCompleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_status_round_trips_known_codes() {
        for code in [0, 1, 2, 3, 4] {
            assert_eq!(RawStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn unknown_raw_codes_fall_back_to_blank() {
        assert_eq!(RawStatus::from_code(7), RawStatus::Blank);
        assert_eq!(RawStatus::from_code(-1), RawStatus::Blank);
    }

    #[test]
    fn metric_codes_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_code(metric.code()), Some(metric));
        }
        assert_eq!(Metric::from_code("??"), None);
    }

    #[test]
    fn auto_verified_counts_as_verified() {
        assert!(RawStatus::AutoVerified.is_verified());
        assert!(FieldStatus::AutoVerified.counts_as_verified());
        assert!(!FieldStatus::Awaiting.counts_as_verified());
    }
}
