use crate::core::call::classified;
use crate::core::{
    AffinityDomain, AvailabilityStatus, DocumentEntry, DocumentReference, PatientIdentifier,
    ResponseOutcome, ResponseStatus, Result, Transport,
};
use crate::domain::ports::{FindDocumentsQuery, GetDocumentsQuery, ReturnType};
use std::collections::HashMap;
use std::time::Duration;

/// Registry-side stored queries (ITI-18).
pub struct QueryEngine<'a, T: Transport> {
    transport: &'a T,
    deadline: Option<Duration>,
}

impl<'a, T: Transport> QueryEngine<'a, T> {
    pub fn new(transport: &'a T, deadline: Option<Duration>) -> Self {
        Self {
            transport,
            deadline,
        }
    }

    /// Reference-only FindDocuments query.
    ///
    /// References come back in registry-return order and are never reordered; metadata
    /// selection depends on their position.
    pub async fn find_document_references(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        status_filter: &[AvailabilityStatus],
    ) -> Result<ResponseOutcome> {
        let outcome = self
            .find_documents(domain, patient_id, status_filter, ReturnType::ObjectRef)
            .await?;
        tracing::info!(
            "Query for document references. Response status: {}. Returned {} references.",
            outcome.status,
            outcome.references.len()
        );
        Ok(outcome)
    }

    /// FindDocuments query returning full document entries.
    pub async fn find_document_entries(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        status_filter: &[AvailabilityStatus],
    ) -> Result<ResponseOutcome> {
        let outcome = self
            .find_documents(domain, patient_id, status_filter, ReturnType::LeafClass)
            .await?;
        tracing::info!(
            "Query for document entries. Response status: {}. Returned {} documents.",
            outcome.status,
            outcome.document_entries.len()
        );
        Ok(outcome)
    }

    async fn find_documents(
        &self,
        domain: &AffinityDomain,
        patient_id: &PatientIdentifier,
        status_filter: &[AvailabilityStatus],
        return_type: ReturnType,
    ) -> Result<ResponseOutcome> {
        let registry = domain.require_registry()?;
        patient_id.validate()?;

        let status = if status_filter.is_empty() {
            AvailabilityStatus::default_filter()
        } else {
            status_filter.to_vec()
        };

        let query = FindDocumentsQuery {
            patient_id: patient_id.clone(),
            status,
            return_type,
        };

        tracing::debug!(
            "FindDocuments for patient {} at {}",
            patient_id,
            registry.uri()
        );
        classified(
            self.deadline,
            "find documents query",
            self.transport.send_find_documents_query(registry, &query),
        )
        .await
    }

    /// GetDocuments query for the most recently returned references.
    ///
    /// Walks `references` backward from the end, taking at most `limit` of them, and returns
    /// the matching entries in the input list's order. Entries the registry returns for ids
    /// that were not asked for are dropped.
    pub async fn fetch_metadata(
        &self,
        domain: &AffinityDomain,
        references: &[DocumentReference],
        limit: Option<usize>,
    ) -> Result<ResponseOutcome> {
        let registry = domain.require_registry()?;
        let entry_uuids = select_most_recent(references, limit);

        if entry_uuids.is_empty() {
            return Ok(ResponseOutcome::new(ResponseStatus::Success));
        }

        let query = GetDocumentsQuery {
            entry_uuids,
            return_type: ReturnType::LeafClass,
        };

        let mut outcome = classified(
            self.deadline,
            "get documents query",
            self.transport.send_get_documents_query(registry, &query),
        )
        .await?;

        outcome.document_entries =
            order_by_request(std::mem::take(&mut outcome.document_entries), &query.entry_uuids);

        tracing::info!(
            "Metadata query for the last {} documents. Response status: {}. Returned {} documents.",
            query.entry_uuids.len(),
            outcome.status,
            outcome.document_entries.len()
        );
        Ok(outcome)
    }
}

/// entryUUIDs of the last `limit` references, in their original relative order.
pub fn select_most_recent(references: &[DocumentReference], limit: Option<usize>) -> Vec<String> {
    let take = limit.unwrap_or(references.len()).min(references.len());
    let mut selected: Vec<String> = references
        .iter()
        .rev()
        .take(take)
        .map(|r| r.entry_uuid.clone())
        .collect();
    selected.reverse();
    selected
}

fn order_by_request(entries: Vec<DocumentEntry>, requested: &[String]) -> Vec<DocumentEntry> {
    let position: HashMap<&str, usize> = requested
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut ranked: Vec<(usize, DocumentEntry)> = Vec::with_capacity(entries.len());
    for entry in entries {
        match position.get(entry.reference.entry_uuid.as_str()) {
            Some(&i) => ranked.push((i, entry)),
            None => tracing::warn!(
                "Registry returned unrequested entry {}, ignoring it",
                entry.reference.entry_uuid
            ),
        }
    }
    ranked.sort_by_key(|(i, _)| *i);
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

/// First entry whose uniqueId matches, scanning the whole list.
pub fn find_document_by_unique_id<'e>(
    entries: &'e [DocumentEntry],
    unique_id: &str,
) -> Option<&'e DocumentReference> {
    entries
        .iter()
        .find(|entry| entry.reference.unique_id == unique_id)
        .map(|entry| &entry.reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::*;
    use crate::domain::ports::TransportResponse;

    #[tokio::test]
    async fn test_references_keep_registry_order() {
        let refs = vec![reference(3), reference(1), reference(2)];
        let transport = MockTransport::new().on_find(with_references(refs.clone()));
        let engine = QueryEngine::new(&transport, None);

        let outcome = engine
            .find_document_references(&domain(), &patient(), &[])
            .await
            .unwrap();

        assert_eq!(outcome.status, ResponseStatus::Success);
        assert_eq!(outcome.references, refs);

        match &transport.calls()[0] {
            RecordedCall::Find(query) => {
                assert_eq!(query.status, vec![AvailabilityStatus::Approved]);
                assert_eq!(query.return_type, ReturnType::ObjectRef);
                assert_eq!(query.patient_id, patient());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        let transport = MockTransport::new().failing_find("connection refused");
        let engine = QueryEngine::new(&transport, None);

        let outcome = engine
            .find_document_references(&domain(), &patient(), &[AvailabilityStatus::Approved])
            .await
            .unwrap();

        assert_eq!(outcome.status, ResponseStatus::Unavailable);
        assert!(outcome.references.is_empty());
        assert!(outcome.document_entries.is_empty());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_registry_fails_before_transport() {
        let transport = MockTransport::new();
        let engine = QueryEngine::new(&transport, None);
        let submission_only =
            AffinityDomain::new(ORG, None, Some("http://localhost:9091/xds-iti41"), None).unwrap();

        let err = engine
            .find_document_references(&submission_only, &patient(), &[])
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_select_most_recent_takes_tail() {
        let refs: Vec<_> = (1..=5).map(reference).collect();

        let selected = select_most_recent(&refs, Some(2));
        assert_eq!(
            selected,
            vec![refs[3].entry_uuid.clone(), refs[4].entry_uuid.clone()]
        );

        assert_eq!(select_most_recent(&refs, None).len(), 5);
        assert_eq!(select_most_recent(&refs, Some(10)).len(), 5);
        assert!(select_most_recent(&refs, Some(0)).is_empty());
        assert!(select_most_recent(&[], Some(3)).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_metadata_returns_last_k_in_stable_order() {
        let refs: Vec<_> = (1..=4).map(reference).collect();
        // Registry answers out of order and with one entry nobody asked for.
        let transport =
            MockTransport::new().on_get(with_entries(vec![entry(4), entry(1), entry(3)]));
        let engine = QueryEngine::new(&transport, None);

        let outcome = engine
            .fetch_metadata(&domain(), &refs, Some(2))
            .await
            .unwrap();

        let ids: Vec<_> = outcome
            .document_entries
            .iter()
            .map(|e| e.reference.entry_uuid.clone())
            .collect();
        assert_eq!(ids, vec![refs[2].entry_uuid.clone(), refs[3].entry_uuid.clone()]);

        match &transport.calls()[0] {
            RecordedCall::Get(query) => {
                assert_eq!(query.entry_uuids.len(), 2);
                assert_eq!(query.return_type, ReturnType::LeafClass);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_metadata_without_references_skips_transport() {
        let transport = MockTransport::new();
        let engine = QueryEngine::new(&transport, None);

        let outcome = engine.fetch_metadata(&domain(), &[], Some(3)).await.unwrap();

        assert!(outcome.is_success());
        assert!(outcome.document_entries.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_metadata_keeps_registry_errors() {
        let transport = MockTransport::new().on_get(TransportResponse {
            status: Some("urn:ihe:iti:2007:ResponseStatusType:PartialSuccess".to_string()),
            error_list: Some(vec![crate::domain::ports::RegistryError {
                value: Some("XDSRegistryBusy".to_string()),
                ..Default::default()
            }]),
            document_entries: vec![entry(1)],
            ..Default::default()
        });
        let engine = QueryEngine::new(&transport, None);

        let outcome = engine
            .fetch_metadata(&domain(), &[reference(1)], None)
            .await
            .unwrap();

        assert_eq!(outcome.status, ResponseStatus::PartialSuccess);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.document_entries.len(), 1);
    }

    #[test]
    fn test_find_by_unique_id_scans_every_entry() {
        let entries: Vec<_> = (1..=4).map(entry).collect();

        // The match sits last: a scan that gives up on the first mismatch would miss it.
        let found = find_document_by_unique_id(&entries, "1.2.3.4").unwrap();
        assert_eq!(found.entry_uuid, entries[3].reference.entry_uuid);

        assert!(find_document_by_unique_id(&entries, "1.2.3.1").is_some());
        assert!(find_document_by_unique_id(&entries, "9.9.9").is_none());
        assert!(find_document_by_unique_id(&[], "1.2.3.1").is_none());
    }
}
