use crate::core::call::classified;
use crate::core::{
    AffinityDomain, Code, DocumentMetadata, PatientIdentifier, ResponseOutcome, Result,
    SubmissionSet, Transport,
};
use crate::domain::model::SubmittedDocument;
use crate::domain::ports::SubmissionRequest;
use crate::utils::error::XdsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// UUID-derived OID (`2.25.<decimal uuid>`), usable as a document or submission set uniqueId.
pub fn generate_unique_id() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

fn generate_entry_uuid() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

/// A document about to be submitted.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub unique_id: Option<String>,
}

impl NewDocument {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_generated_unique_id(self) -> Self {
        self.with_unique_id(generate_unique_id())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientIds {
    /// Patient id in the affinity domain.
    pub destination: Option<PatientIdentifier>,
    /// Patient id in the submitting system.
    pub source: Option<PatientIdentifier>,
}

/// Caller-supplied metadata profile: the coded values a deployment stamps on its documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodedAttributes {
    pub class_code: Option<Code>,
    pub type_code: Option<Code>,
    pub format_code: Option<Code>,
    pub practice_setting_code: Option<Code>,
    pub healthcare_facility_type_code: Option<Code>,
    #[serde(default)]
    pub confidentiality_codes: Vec<Code>,
    pub language_code: Option<String>,
    /// Used when the document itself does not name a MIME type.
    pub mime_type: Option<String>,
    pub title: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
}

/// Builds validated metadata, reporting every missing required attribute at once.
pub fn build_metadata(
    document: &NewDocument,
    patient_ids: &PatientIds,
    attributes: &CodedAttributes,
) -> Result<DocumentMetadata> {
    fn required<T: Clone>(
        missing: &mut Vec<&'static str>,
        name: &'static str,
        value: Option<&T>,
    ) -> Option<T> {
        if value.is_none() {
            missing.push(name);
        }
        value.cloned()
    }

    let mut missing = Vec::new();

    let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

    let class_code = required(&mut missing, "classCode", attributes.class_code.as_ref());
    let type_code = required(&mut missing, "typeCode", attributes.type_code.as_ref());
    let format_code = required(&mut missing, "formatCode", attributes.format_code.as_ref());
    if attributes.confidentiality_codes.is_empty() {
        missing.push("confidentialityCode");
    }
    let healthcare_facility_type_code = required(
        &mut missing,
        "healthcareFacilityTypeCode",
        attributes.healthcare_facility_type_code.as_ref(),
    );
    let practice_setting_code = required(
        &mut missing,
        "practiceSettingCode",
        attributes.practice_setting_code.as_ref(),
    );
    let language_code = required(
        &mut missing,
        "languageCode",
        non_blank(&attributes.language_code).as_ref(),
    );
    let mime_type = required(
        &mut missing,
        "mimeType",
        non_blank(&document.mime_type)
            .or_else(|| non_blank(&attributes.mime_type))
            .as_ref(),
    );
    let unique_id = required(&mut missing, "uniqueId", non_blank(&document.unique_id).as_ref());
    let destination_patient_id = required(
        &mut missing,
        "destinationPatientId",
        patient_ids.destination.as_ref(),
    );

    match (
        class_code,
        type_code,
        format_code,
        healthcare_facility_type_code,
        practice_setting_code,
        language_code,
        mime_type,
        unique_id,
        destination_patient_id,
    ) {
        (
            Some(class_code),
            Some(type_code),
            Some(format_code),
            Some(healthcare_facility_type_code),
            Some(practice_setting_code),
            Some(language_code),
            Some(mime_type),
            Some(unique_id),
            Some(destination_patient_id),
        ) if missing.is_empty() => Ok(DocumentMetadata {
            entry_uuid: generate_entry_uuid(),
            class_code,
            type_code,
            format_code,
            practice_setting_code,
            healthcare_facility_type_code,
            confidentiality_codes: attributes.confidentiality_codes.clone(),
            language_code,
            mime_type,
            unique_id,
            title: attributes.title.clone(),
            creation_time: attributes.creation_time,
            source_patient_id: patient_ids.source.clone(),
            destination_patient_id,
        }),
        _ => Err(XdsError::validation(format!(
            "missing required document metadata: {}",
            missing.join(", ")
        ))),
    }
}

/// Bundles documents into a submission set.
///
/// All documents must be about the same destination patient, which becomes the set's
/// patient id.
pub fn assemble_submission_set(
    content_type_code: Code,
    documents: Vec<(Vec<u8>, DocumentMetadata)>,
) -> Result<SubmissionSet> {
    let Some((_, first)) = documents.first() else {
        return Err(XdsError::validation(
            "a submission set needs at least one document",
        ));
    };
    let patient_id = first.destination_patient_id.clone();

    if let Some((_, other)) = documents
        .iter()
        .find(|(_, m)| m.destination_patient_id != patient_id)
    {
        return Err(XdsError::validation(format!(
            "document {} is for patient {}, submission set is for {}",
            other.unique_id, other.destination_patient_id, patient_id
        )));
    }

    Ok(SubmissionSet {
        unique_id: generate_unique_id(),
        submission_time: Utc::now(),
        author: None,
        content_type_code,
        patient_id,
        documents: documents
            .into_iter()
            .map(|(content, metadata)| SubmittedDocument { content, metadata })
            .collect(),
    })
}

/// Provide-and-register (ITI-41) against the domain's repository.
///
/// Uniqueness of the documents' uniqueIds is not checked here. Callers that care run the
/// duplicate check first; check and submit are not atomic, so two concurrent submitters of
/// the same uniqueId can both pass it.
pub struct SubmissionEngine<'a, T: Transport> {
    transport: &'a T,
    deadline: Option<Duration>,
}

impl<'a, T: Transport> SubmissionEngine<'a, T> {
    pub fn new(transport: &'a T, deadline: Option<Duration>) -> Self {
        Self {
            transport,
            deadline,
        }
    }

    pub async fn submit(
        &self,
        domain: &AffinityDomain,
        submission_set: &SubmissionSet,
    ) -> Result<ResponseOutcome> {
        let repository = domain.require_repository()?;
        let request = SubmissionRequest {
            source_id: domain.organizational_id(),
            submission_set,
        };

        tracing::info!(
            "Sending submission set {} with {} documents to {}",
            submission_set.unique_id(),
            submission_set.documents().len(),
            repository.uri()
        );

        let outcome = classified(
            self.deadline,
            "provide and register",
            self.transport.send_submission(repository, &request),
        )
        .await?;

        for error in &outcome.errors {
            tracing::warn!(
                context = %error.context,
                location = %error.location,
                value = %error.value,
                "Submission error"
            );
        }
        tracing::info!("done. Response: {}", outcome.status);
        Ok(outcome)
    }
}
