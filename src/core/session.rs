use crate::core::events::{EventLog, EventOutcome, SessionEvent};
use crate::core::query::{find_document_by_unique_id, QueryEngine};
use crate::core::retrieve::RetrievalEngine;
use crate::core::submission::SubmissionEngine;
use crate::core::{
    AffinityDomain, AvailabilityStatus, DocumentReference, PatientIdentifier, ResponseOutcome,
    ResponseStatus, Result, Storage, StoredLocation, SubmissionSet, Transport,
};
use crate::utils::error::{ErrorCategory, XdsError};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Upper bound for each transport call and each file write.
    pub deadline: Option<Duration>,
    /// How many of the most recent references `query` resolves to metadata.
    pub metadata_limit: Option<usize>,
    /// Skip the retrieval when the deterministic target file already exists.
    pub skip_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub reference: DocumentReference,
    pub location: StoredLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadFailure {
    pub reference: DocumentReference,
    pub error: String,
}

/// Result of downloading everything a query found for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub outcome: ResponseOutcome,
    pub stored: Vec<StoredDocument>,
    pub failures: Vec<DownloadFailure>,
    pub events: Vec<SessionEvent>,
}

/// Finds `unique_id` among the entries of a metadata query.
///
/// A miss only means "absent" when the registry answered without errors; a failed or partial
/// answer with no match is inconclusive.
fn locate<'e>(
    outcome: &'e ResponseOutcome,
    unique_id: &str,
) -> Result<Option<&'e DocumentReference>> {
    if outcome.is_unavailable() {
        return Err(XdsError::unavailable(
            outcome
                .transport_error
                .clone()
                .unwrap_or_else(|| "registry reported Unavailable".to_string()),
        ));
    }

    let found = find_document_by_unique_id(&outcome.document_entries, unique_id);
    if found.is_none() && outcome.status >= ResponseStatus::PartialSuccess {
        let details: Vec<&str> = outcome.errors.iter().map(|e| e.value.as_str()).collect();
        return Err(XdsError::unavailable(format!(
            "registry answered {} [{}], cannot tell whether {} exists",
            outcome.status,
            details.join(", "),
            unique_id
        )));
    }
    Ok(found)
}

/// Document consumer and source for one or more affinity domains.
///
/// Holds no state between calls: every method takes the affinity domain it should talk
/// to, and callers may run calls concurrently across domains and patients.
pub struct DocumentSharingSession<T: Transport, S: Storage> {
    transport: T,
    storage: S,
    options: SessionOptions,
}

impl<T: Transport, S: Storage> DocumentSharingSession<T, S> {
    pub fn new(transport: T, storage: S) -> Self {
        Self {
            transport,
            storage,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn queries(&self) -> QueryEngine<'_, T> {
        QueryEngine::new(&self.transport, self.options.deadline)
    }

    fn retrieval(&self) -> RetrievalEngine<'_, T, S> {
        RetrievalEngine::new(&self.transport, &self.storage, self.options.deadline)
    }

    fn submissions(&self) -> SubmissionEngine<'_, T> {
        SubmissionEngine::new(&self.transport, self.options.deadline)
    }

    /// Reference query followed by a metadata query for the most recent references.
    ///
    /// The result carries the references of the first query, the entries of the second,
    /// the errors of both, and the worse of the two statuses.
    pub async fn query(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        status_filter: &[AvailabilityStatus],
    ) -> Result<ResponseOutcome> {
        let queries = self.queries();
        let found = queries
            .find_document_references(domain, patient_id, status_filter)
            .await?;

        if found.references.is_empty() {
            tracing::info!(
                "No Documents found for patient '{}' in registry: {}",
                patient_id,
                domain.require_registry()?.uri()
            );
            return Ok(found);
        }

        let metadata = queries
            .fetch_metadata(domain, &found.references, self.options.metadata_limit)
            .await?;

        let mut errors = found.errors;
        errors.extend(metadata.errors);

        Ok(ResponseOutcome {
            status: found.status.max(metadata.status),
            errors,
            references: found.references,
            document_entries: metadata.document_entries,
            attachments: Vec::new(),
            transport_error: metadata.transport_error,
        })
    }

    /// Retrieves `reference` from the repository and stores it under its deterministic name,
    /// optionally inside the `destination` subdirectory of the storage root.
    pub async fn retrieve_and_store(
        &self,
        domain: &AffinityDomain,
        reference: &DocumentReference,
        destination: Option<&str>,
    ) -> Result<StoredLocation> {
        let retrieval = self.retrieval();

        if self.options.skip_existing {
            if let Some(path) = retrieval.existing(reference, destination).await? {
                tracing::info!(
                    "Document {} already stored at {}, skipping retrieval",
                    reference.unique_id,
                    path.display()
                );
                return Ok(StoredLocation { path, reused: true });
            }
        }

        let document = retrieval.retrieve(domain, reference).await?;
        retrieval
            .store(reference, &document.content, destination)
            .await
    }

    pub async fn submit(
        &self,
        domain: &AffinityDomain,
        submission_set: &SubmissionSet,
    ) -> Result<ResponseOutcome> {
        self.submissions().submit(domain, submission_set).await
    }

    /// Whether the registry already lists a document with `unique_id` for the patient.
    ///
    /// Scans every returned entry. An unreachable registry, or a registry that answered with
    /// errors and no matching entry, is an error, not "absent".
    pub async fn exists_by_unique_id(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        unique_id: &str,
    ) -> Result<bool> {
        let outcome = self
            .queries()
            .find_document_entries(domain, patient_id, &AvailabilityStatus::default_filter())
            .await?;

        let exists = locate(&outcome, unique_id)?.is_some();
        tracing::debug!(
            "Document {} {} for patient {}",
            unique_id,
            if exists { "already exists" } else { "not yet present" },
            patient_id
        );
        Ok(exists)
    }

    /// Duplicate check on every document of the set, then submission.
    ///
    /// The check is advisory: another submitter can register the same uniqueId between the
    /// check and the submission. Registries offering idempotent submission are the only
    /// real guard against that.
    pub async fn submit_new_document(
        &self,
        domain: &AffinityDomain,
        submission_set: &SubmissionSet,
    ) -> Result<ResponseOutcome> {
        for document in submission_set.documents() {
            let unique_id = &document.metadata.unique_id;
            if self
                .exists_by_unique_id(domain, submission_set.patient_id(), unique_id)
                .await?
            {
                return Err(XdsError::DuplicateUniqueId {
                    unique_id: unique_id.clone(),
                });
            }
        }
        self.submit(domain, submission_set).await
    }

    /// Queries the patient's documents and stores every one of them.
    ///
    /// Documents that cannot be retrieved are reported and skipped; storage failures abort.
    pub async fn download_patient_documents(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        destination: Option<&str>,
    ) -> Result<DownloadReport> {
        let mut log = EventLog::new();

        let outcome = self
            .query(domain, patient_id, &AvailabilityStatus::default_filter())
            .await?;
        log.record(
            "query",
            outcome.status,
            format!(
                "Returned {} references and {} documents for patient {}",
                outcome.references.len(),
                outcome.document_entries.len(),
                patient_id
            ),
        );

        let mut stored = Vec::new();
        let mut failures = Vec::new();

        for entry in &outcome.document_entries {
            let reference = &entry.reference;
            match self.retrieve_and_store(domain, reference, destination).await {
                Ok(location) => {
                    log.record(
                        "retrieve",
                        EventOutcome::Succeeded,
                        format!(
                            "Document {} stored to {}",
                            reference.unique_id,
                            location.path.display()
                        ),
                    );
                    stored.push(StoredDocument {
                        reference: reference.clone(),
                        location,
                    });
                }
                Err(e)
                    if matches!(e.category(), ErrorCategory::Storage | ErrorCategory::Timeout) =>
                {
                    log.record(
                        "store",
                        EventOutcome::Failed,
                        format!("Storing {} failed: {}", reference.unique_id, e),
                    );
                    return Err(e);
                }
                Err(e) => {
                    log.record(
                        "retrieve",
                        EventOutcome::Failed,
                        format!("Document {} not retrieved: {}", reference.unique_id, e),
                    );
                    failures.push(DownloadFailure {
                        reference: reference.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(DownloadReport {
            outcome,
            stored,
            failures,
            events: log.into_events(),
        })
    }

    /// Finds the patient's document with `unique_id` and stores it; `None` when the registry
    /// does not list it.
    pub async fn fetch_document_by_unique_id(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        unique_id: &str,
        destination: Option<&str>,
    ) -> Result<Option<StoredLocation>> {
        let outcome = self
            .queries()
            .find_document_entries(domain, patient_id, &AvailabilityStatus::default_filter())
            .await?;

        match locate(&outcome, unique_id)? {
            Some(reference) => self
                .retrieve_and_store(domain, reference, destination)
                .await
                .map(Some),
            None => {
                tracing::info!("No document {} for patient {}", unique_id, patient_id);
                Ok(None)
            }
        }
    }
}
