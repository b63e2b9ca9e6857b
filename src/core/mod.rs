pub mod call;
pub mod classifier;
pub mod events;
pub mod query;
pub mod retrieve;
pub mod session;
pub mod submission;

pub use crate::domain::model::{
    AffinityDomain, AvailabilityStatus, Code, DocumentEntry, DocumentMetadata, DocumentReference,
    PatientIdentifier, SubmissionSet,
};
pub use crate::domain::outcome::{
    ErrorDetail, ResponseOutcome, ResponseStatus, RetrievedDocument, Severity, StoredLocation,
};
pub use crate::domain::ports::{Storage, Transport, TransportResponse};
pub use crate::utils::error::Result;

#[cfg(test)]
pub(crate) mod test_support;
