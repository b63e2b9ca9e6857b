pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use self::adapters::{HttpTransport, LocalStorage};
pub use self::config::SessionConfig;
pub use self::core::session::{DocumentSharingSession, DownloadReport, SessionOptions};
pub use self::core::submission::{
    assemble_submission_set, build_metadata, CodedAttributes, NewDocument, PatientIds,
};
pub use self::core::{
    AffinityDomain, AvailabilityStatus, DocumentReference, PatientIdentifier, ResponseOutcome,
    ResponseStatus,
};
pub use self::utils::error::{Result, XdsError};
