use crate::core::call::{classified, within};
use crate::core::{
    AffinityDomain, DocumentReference, Result, RetrievedDocument, Storage, StoredLocation,
    Transport,
};
use crate::domain::ports::RetrieveRequest;
use crate::utils::error::{RetrievalFailure, XdsError};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

const UUID_URN_PREFIX: &str = "urn:uuid:";

/// Builds the ITI-43 request for `reference` against the domain's repository.
pub fn retrieve_request(
    domain: &AffinityDomain,
    reference: &DocumentReference,
) -> Result<RetrieveRequest> {
    let repository = domain.require_repository()?;
    Ok(RetrieveRequest {
        repository_unique_id: reference.repository_unique_id.clone(),
        repository_uri: repository.uri().clone(),
        document_unique_id: reference.unique_id.clone(),
    })
}

/// `repositoryUniqueId_entryUUID_mime.type`, e.g. `1.1.4567332.1.2_6f1d..._text.xml`.
///
/// The same reference always maps to the same name.
pub fn stored_file_name(reference: &DocumentReference) -> Result<String> {
    let entry_uuid = reference
        .entry_uuid
        .strip_prefix(UUID_URN_PREFIX)
        .unwrap_or(&reference.entry_uuid);
    let mime_type = reference.mime_type.replace('/', ".");

    for (field, part) in [
        ("repositoryUniqueId", reference.repository_unique_id.as_str()),
        ("entryUUID", entry_uuid),
        ("mimeType", mime_type.as_str()),
    ] {
        if part.is_empty() || part.contains(['/', '\\', '\0']) || part.contains("..") {
            return Err(XdsError::validation(format!(
                "{} '{}' cannot be used in a file name",
                field, part
            )));
        }
    }

    Ok(format!(
        "{}_{}_{}",
        reference.repository_unique_id, entry_uuid, mime_type
    ))
}

/// Relative storage path for `name`, optionally inside a caller-chosen subdirectory.
pub fn storage_path(destination: Option<&str>, name: &str) -> Result<String> {
    let Some(destination) = destination.filter(|d| !d.is_empty()) else {
        return Ok(name.to_string());
    };

    let escapes = Path::new(destination)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(XdsError::validation(format!(
            "destination '{}' must be a relative path below the storage root",
            destination
        )));
    }

    Ok(format!("{}/{}", destination.trim_end_matches('/'), name))
}

/// Repository retrieval (ITI-43) plus deterministic local persistence.
pub struct RetrievalEngine<'a, T: Transport, S: Storage> {
    transport: &'a T,
    storage: &'a S,
    deadline: Option<Duration>,
}

impl<'a, T: Transport, S: Storage> RetrievalEngine<'a, T, S> {
    pub fn new(transport: &'a T, storage: &'a S, deadline: Option<Duration>) -> Self {
        Self {
            transport,
            storage,
            deadline,
        }
    }

    /// Fetches the first attachment for `reference`.
    ///
    /// Zero attachments is `RetrievalError { NoAttachments }`, the normal "not found" answer.
    /// No response at all is `TransportUnavailable`.
    pub async fn retrieve(
        &self,
        domain: &AffinityDomain,
        reference: &DocumentReference,
    ) -> Result<RetrievedDocument> {
        let request = retrieve_request(domain, reference)?;
        let repository = domain.require_repository()?;

        tracing::debug!(
            "Retrieving {} from repository {} at {}",
            request.document_unique_id,
            request.repository_unique_id,
            request.repository_uri
        );

        let outcome = classified(
            self.deadline,
            "retrieve document set",
            self.transport.send_retrieve_request(repository, &request),
        )
        .await?;

        if let Some(reason) = outcome.transport_error {
            return Err(XdsError::unavailable(reason));
        }

        let attachment_count = outcome.attachments.len();
        let Some(first) = outcome.attachments.into_iter().next() else {
            tracing::info!(
                "Repository returned no attachments for {} (status {})",
                reference.unique_id,
                outcome.status
            );
            return Err(XdsError::RetrievalError {
                reason: RetrievalFailure::NoAttachments,
            });
        };

        if !outcome.errors.is_empty() {
            tracing::warn!(
                "Retrieve of {} returned {} errors alongside the document",
                reference.unique_id,
                outcome.errors.len()
            );
        }
        tracing::info!(
            "Retrieve successful. Retrieved: {} documents.",
            attachment_count
        );

        Ok(RetrievedDocument {
            content: first.content,
            mime_type: first.mime_type,
            status: outcome.status,
            errors: outcome.errors,
            attachment_count,
        })
    }

    /// Path the content of `reference` would be stored at, if it already exists.
    pub async fn existing(
        &self,
        reference: &DocumentReference,
        destination: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let path = storage_path(destination, &stored_file_name(reference)?)?;
        self.storage.existing(&path).await
    }

    /// Writes `content` under the deterministic name of `reference`.
    ///
    /// Storing the same reference twice overwrites the single file in place.
    pub async fn store(
        &self,
        reference: &DocumentReference,
        content: &[u8],
        destination: Option<&str>,
    ) -> Result<StoredLocation> {
        let path = storage_path(destination, &stored_file_name(reference)?)?;
        let written = within(
            self.deadline,
            "store document",
            self.storage.write_file(&path, content),
        )
        .await?;

        tracing::info!("Document was stored to: {}", written.display());
        Ok(StoredLocation {
            path: written,
            reused: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::*;
    use crate::core::ResponseStatus;
    use crate::domain::ports::TransportResponse;

    #[test]
    fn test_stored_file_name_is_deterministic() {
        let reference = DocumentReference {
            entry_uuid: "urn:uuid:6f1d2a4e-1b7c-4c55-9d41-0e2f3a6b7c8d".to_string(),
            unique_id: "1.2.3".to_string(),
            repository_unique_id: "1.1.4567332.1.2".to_string(),
            mime_type: "text/xml".to_string(),
            patient_id: None,
        };

        let name = stored_file_name(&reference).unwrap();
        assert_eq!(
            name,
            "1.1.4567332.1.2_6f1d2a4e-1b7c-4c55-9d41-0e2f3a6b7c8d_text.xml"
        );
        assert_eq!(stored_file_name(&reference.clone()).unwrap(), name);
    }

    #[test]
    fn test_stored_file_name_rejects_path_tricks() {
        let mut traversal = reference(1);
        traversal.repository_unique_id = "../etc".to_string();
        assert!(matches!(
            stored_file_name(&traversal),
            Err(XdsError::ValidationError { .. })
        ));

        let mut backslash = reference(1);
        backslash.entry_uuid = "urn:uuid:a\\b".to_string();
        assert!(stored_file_name(&backslash).is_err());
    }

    #[test]
    fn test_storage_path() {
        assert_eq!(storage_path(None, "f").unwrap(), "f");
        assert_eq!(storage_path(Some(""), "f").unwrap(), "f");
        assert_eq!(storage_path(Some("patient-42/"), "f").unwrap(), "patient-42/f");
        assert!(storage_path(Some("../outside"), "f").is_err());
        assert!(storage_path(Some("/abs"), "f").is_err());
    }

    #[tokio::test]
    async fn test_retrieve_builds_request_from_reference() {
        let transport = MockTransport::new().on_retrieve(with_attachment(b"<ClinicalDocument/>"));
        let storage = MockStorage::new();
        let engine = RetrievalEngine::new(&transport, &storage, None);

        let document = engine.retrieve(&domain(), &reference(1)).await.unwrap();

        assert_eq!(document.content, b"<ClinicalDocument/>");
        assert_eq!(document.status, ResponseStatus::Success);
        assert_eq!(document.attachment_count, 1);

        match &transport.calls()[0] {
            RecordedCall::Retrieve(request) => {
                assert_eq!(request.repository_unique_id, "1.1.4567332.1.2");
                assert_eq!(request.document_unique_id, "1.2.3.1");
                assert_eq!(
                    request.repository_uri.as_str(),
                    "http://localhost:9091/xds-iti43"
                );
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_attachments_is_not_found_and_stores_nothing() {
        let transport = MockTransport::new().on_retrieve(TransportResponse {
            status: Some("Failure".to_string()),
            ..Default::default()
        });
        let storage = MockStorage::new();
        let engine = RetrievalEngine::new(&transport, &storage, None);

        let err = engine.retrieve(&domain(), &reference(1)).await.unwrap_err();

        assert!(matches!(
            err,
            XdsError::RetrievalError {
                reason: RetrievalFailure::NoAttachments
            }
        ));
        assert_eq!(storage.file_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        let transport = MockTransport::new().failing_retrieve("connection reset");
        let storage = MockStorage::new();
        let engine = RetrievalEngine::new(&transport, &storage, None);

        let err = engine.retrieve(&domain(), &reference(1)).await.unwrap_err();
        assert!(matches!(err, XdsError::TransportUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let transport = MockTransport::new();
        let storage = MockStorage::new();
        let engine = RetrievalEngine::new(&transport, &storage, None);
        let reference = reference(1);

        let first = engine.store(&reference, b"v1", None).await.unwrap();
        let second = engine.store(&reference, b"v1", None).await.unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(storage.file_count(), 1);
        let name = stored_file_name(&reference).unwrap();
        assert_eq!(storage.get_file(&name).unwrap(), b"v1");
        assert_eq!(
            engine.existing(&reference, None).await.unwrap(),
            Some(PathBuf::from(name))
        );
    }

    #[tokio::test]
    async fn test_storage_errors_are_raised() {
        let transport = MockTransport::new();
        let storage = MockStorage::failing();
        let engine = RetrievalEngine::new(&transport, &storage, None);

        let err = engine.store(&reference(1), b"v1", None).await.unwrap_err();
        assert!(matches!(err, XdsError::IoError(_)));
    }
}
