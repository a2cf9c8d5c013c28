pub mod classify;
pub mod columns;
pub mod consistency;
pub mod datetime;
pub mod dedupe;
pub mod field_index;
pub mod repeating;
pub mod suppression;
pub mod verification;

pub use classify::{Classifier, is_checkbox_field, map_field_status, site_of};
pub use columns::{ColumnClass, ColumnClassifier, ConditionalSkips, SkipRule, SkipTrigger, VISIT_TABLE};
pub use consistency::validate_cross_form;
pub use datetime::{clean_date, format_timestamp, parse_date, parse_history_timestamp};
pub use dedupe::dedupe_repeating_rows;
pub use field_index::{FieldStatusCounts, FieldStatusIndex};
pub use repeating::{
    FrequencyDose, RepeatingRecord, Sibling, SiblingRole, format_daily_dose, is_checked,
    parse_frequency_multiplier, parse_repeating_group, split_multi,
};
pub use suppression::SuppressionContext;
pub use verification::{
    FormKey, MonitorActivity, VerificationIndex, derive_form_code, is_verified_status,
    monitor_activity,
};
