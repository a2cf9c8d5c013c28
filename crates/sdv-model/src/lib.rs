pub mod ae;
pub mod error;
pub mod records;
pub mod status;

pub use ae::{AdverseEventRecord, DeathDetails, RelatednessAxes, SaeCriteria};
pub use error::{Result, SdvError};
pub use records::{
    ClassifiedField, FieldObservation, FormStatusEntry, NULL_SENTINELS, VerificationDetails,
    VerificationEvent, is_real_value,
};
pub use status::{DataEntryStatus, FieldStatus, Metric, RawStatus};
