use crate::domain::model::{DocumentEntry, DocumentReference};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classified status of one transport call.
///
/// Variants are ordered from best to worst so two outcomes can be merged with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Warning,
    PartialSuccess,
    Error,
    Failure,
    Unavailable,
}

impl ResponseStatus {
    pub fn is_success(self) -> bool {
        self == ResponseStatus::Success
    }

    pub fn name(self) -> &'static str {
        match self {
            ResponseStatus::Success => "Success",
            ResponseStatus::Warning => "Warning",
            ResponseStatus::PartialSuccess => "PartialSuccess",
            ResponseStatus::Error => "Error",
            ResponseStatus::Failure => "Failure",
            ResponseStatus::Unavailable => "Unavailable",
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub context: String,
    pub location: String,
    pub value: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub document_unique_id: Option<String>,
    pub mime_type: Option<String>,
    #[serde(with = "crate::utils::base64_bytes")]
    pub content: Vec<u8>,
}

/// What callers get back from every query and submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutcome {
    pub status: ResponseStatus,
    pub errors: Vec<ErrorDetail>,
    pub references: Vec<DocumentReference>,
    pub document_entries: Vec<DocumentEntry>,
    #[serde(skip)]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<String>,
}

impl ResponseOutcome {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            errors: Vec::new(),
            references: Vec::new(),
            document_entries: Vec::new(),
            attachments: Vec::new(),
            transport_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == ResponseStatus::Unavailable
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.errors.iter().map(|e| e.severity).max()
    }
}

/// Content fetched from a repository, with whatever errors accompanied it.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub status: ResponseStatus,
    pub errors: Vec<ErrorDetail>,
    pub attachment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredLocation {
    pub path: PathBuf,
    /// True when the file already existed and no retrieval was made.
    pub reused: bool,
}
