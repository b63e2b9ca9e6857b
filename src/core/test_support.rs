//! In-memory port doubles shared by the engine and session unit tests.

use crate::core::{
    Code, DocumentEntry, DocumentMetadata, DocumentReference, PatientIdentifier, Storage,
    Transport, TransportResponse,
};
use crate::domain::model::{AffinityDomain, Endpoint};
use crate::domain::outcome::Attachment;
use crate::domain::ports::{
    FindDocumentsQuery, GetDocumentsQuery, RetrieveRequest, SubmissionRequest,
};
use crate::utils::error::{Result, XdsError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub(crate) const ORG: &str = "1.19.6.24.109.42.1";

pub(crate) fn domain() -> AffinityDomain {
    AffinityDomain::new(
        ORG,
        Some("http://localhost:9091/xds-iti18"),
        Some("http://localhost:9091/xds-iti43"),
        None,
    )
    .unwrap()
}

pub(crate) fn patient() -> PatientIdentifier {
    PatientIdentifier::new("1.2.3.4.5", "patient-42")
}

pub(crate) fn reference(n: usize) -> DocumentReference {
    DocumentReference {
        entry_uuid: format!("urn:uuid:00000000-0000-0000-0000-00000000000{}", n),
        unique_id: format!("1.2.3.{}", n),
        repository_unique_id: "1.1.4567332.1.2".to_string(),
        mime_type: "text/xml".to_string(),
        patient_id: Some(patient()),
    }
}

pub(crate) fn metadata_for(reference: &DocumentReference) -> DocumentMetadata {
    let code = Code::new("X", "1.2.3", "X");
    DocumentMetadata {
        entry_uuid: reference.entry_uuid.clone(),
        class_code: code.clone(),
        type_code: code.clone(),
        format_code: code.clone(),
        practice_setting_code: code.clone(),
        healthcare_facility_type_code: code,
        confidentiality_codes: vec![Code::normal_confidentiality()],
        language_code: "de-CH".to_string(),
        mime_type: reference.mime_type.clone(),
        unique_id: reference.unique_id.clone(),
        title: None,
        creation_time: None,
        source_patient_id: None,
        destination_patient_id: patient(),
    }
}

pub(crate) fn entry(n: usize) -> DocumentEntry {
    let reference = reference(n);
    DocumentEntry {
        metadata: metadata_for(&reference),
        reference,
    }
}

pub(crate) fn success() -> TransportResponse {
    TransportResponse {
        status: Some("urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success".to_string()),
        ..Default::default()
    }
}

pub(crate) fn with_references(refs: Vec<DocumentReference>) -> TransportResponse {
    TransportResponse {
        references: refs,
        ..success()
    }
}

pub(crate) fn with_entries(entries: Vec<DocumentEntry>) -> TransportResponse {
    TransportResponse {
        document_entries: entries,
        ..success()
    }
}

pub(crate) fn with_attachment(content: &[u8]) -> TransportResponse {
    TransportResponse {
        attachments: vec![Attachment {
            document_unique_id: None,
            mime_type: Some("text/xml".to_string()),
            content: content.to_vec(),
        }],
        ..success()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedCall {
    Find(FindDocumentsQuery),
    Get(GetDocumentsQuery),
    Retrieve(RetrieveRequest),
    Submit { source_id: String, unique_ids: Vec<String> },
}

type Scripted = Arc<Mutex<VecDeque<Result<TransportResponse>>>>;

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    find: Scripted,
    get: Scripted,
    retrieve: Scripted,
    submit: Scripted,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_find(self, response: TransportResponse) -> Self {
        self.find.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn on_get(self, response: TransportResponse) -> Self {
        self.get.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn on_retrieve(self, response: TransportResponse) -> Self {
        self.retrieve.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn on_submit(self, response: TransportResponse) -> Self {
        self.submit.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn failing_find(self, message: &str) -> Self {
        self.find
            .lock()
            .unwrap()
            .push_back(Err(XdsError::unavailable(message)));
        self
    }

    pub(crate) fn failing_retrieve(self, message: &str) -> Self {
        self.retrieve
            .lock()
            .unwrap()
            .push_back(Err(XdsError::unavailable(message)));
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, queue: &Scripted, call: RecordedCall) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push(call);
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(XdsError::unavailable("no scripted response")))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_find_documents_query(
        &self,
        _endpoint: &Endpoint,
        query: &FindDocumentsQuery,
    ) -> Result<TransportResponse> {
        self.next(&self.find, RecordedCall::Find(query.clone()))
    }

    async fn send_get_documents_query(
        &self,
        _endpoint: &Endpoint,
        query: &GetDocumentsQuery,
    ) -> Result<TransportResponse> {
        self.next(&self.get, RecordedCall::Get(query.clone()))
    }

    async fn send_retrieve_request(
        &self,
        _endpoint: &Endpoint,
        request: &RetrieveRequest,
    ) -> Result<TransportResponse> {
        self.next(&self.retrieve, RecordedCall::Retrieve(request.clone()))
    }

    async fn send_submission(
        &self,
        _endpoint: &Endpoint,
        request: &SubmissionRequest<'_>,
    ) -> Result<TransportResponse> {
        let unique_ids = request
            .submission_set
            .documents()
            .iter()
            .map(|d| d.metadata.unique_id.clone())
            .collect();
        self.next(
            &self.submit,
            RecordedCall::Submit {
                source_id: request.source_id.to_string(),
                unique_ids,
            },
        )
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: bool,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub(crate) fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

impl Storage for MockStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<PathBuf> {
        if self.fail_writes {
            return Err(XdsError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only storage",
            )));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(PathBuf::from(path))
    }

    async fn existing(&self, path: &str) -> Result<Option<PathBuf>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .contains_key(path)
            .then(|| PathBuf::from(path)))
    }
}
