use crate::domain::model::{
    AvailabilityStatus, DocumentEntry, DocumentReference, Endpoint, PatientIdentifier,
    SubmissionSet,
};
use crate::domain::outcome::Attachment;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Stored query return type: bare object references or full metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    ObjectRef,
    LeafClass,
}

/// ITI-18 FindDocuments stored query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindDocumentsQuery {
    pub patient_id: PatientIdentifier,
    pub status: Vec<AvailabilityStatus>,
    pub return_type: ReturnType,
}

/// ITI-18 GetDocuments stored query, addressed by entryUUID.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentsQuery {
    #[serde(rename = "entryUUIDs")]
    pub entry_uuids: Vec<String>,
    pub return_type: ReturnType,
}

/// ITI-43 retrieve request for a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveRequest {
    pub repository_unique_id: String,
    pub repository_uri: Url,
    pub document_unique_id: String,
}

/// ITI-41 provide-and-register request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest<'a> {
    pub source_id: &'a str,
    pub submission_set: &'a SubmissionSet,
}

/// One entry of a registry error list, exactly as the transport decoded it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryError {
    pub code_context: Option<String>,
    pub location: Option<String>,
    pub value: Option<String>,
    pub severity: Option<String>,
}

/// Typed response handed back by the transport layer.
///
/// Every field may be missing; the classifier copes with partial data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_list: Option<Vec<RegistryError>>,
    #[serde(default)]
    pub references: Vec<DocumentReference>,
    #[serde(default)]
    pub document_entries: Vec<DocumentEntry>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Wire-level collaborator turning typed requests into registry/repository calls.
///
/// An `Err` means no response was obtained at all (network, TLS, decoding).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_find_documents_query(
        &self,
        endpoint: &Endpoint,
        query: &FindDocumentsQuery,
    ) -> Result<TransportResponse>;

    async fn send_get_documents_query(
        &self,
        endpoint: &Endpoint,
        query: &GetDocumentsQuery,
    ) -> Result<TransportResponse>;

    async fn send_retrieve_request(
        &self,
        endpoint: &Endpoint,
        request: &RetrieveRequest,
    ) -> Result<TransportResponse>;

    async fn send_submission(
        &self,
        endpoint: &Endpoint,
        request: &SubmissionRequest<'_>,
    ) -> Result<TransportResponse>;
}

/// Byte storage addressed by paths relative to a base location.
pub trait Storage: Send + Sync {
    /// Writes `data` all-or-nothing and returns the full path written.
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<PathBuf>> + Send;

    /// Full path of `path` if something is already stored there.
    fn existing(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<PathBuf>>> + Send;
}
