use crate::utils::error::{Result, XdsError};
use crate::utils::validation::{validate_non_empty_string, validate_oid, validate_url};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Coded value triple used throughout XDS metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    pub value: String,
    pub code_system: String,
    pub display_name: String,
}

impl Code {
    pub fn new(
        value: impl Into<String>,
        code_system: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            code_system: code_system.into(),
            display_name: display_name.into(),
        }
    }

    /// HL7 v3 Confidentiality "N".
    pub fn normal_confidentiality() -> Self {
        Self::new("N", "2.16.840.1.113883.5.25", "normal")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentifier {
    pub assigning_authority: String,
    pub local_id: String,
}

impl PatientIdentifier {
    pub fn new(assigning_authority: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            assigning_authority: assigning_authority.into(),
            local_id: local_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_empty_string("patient.assigning_authority", &self.assigning_authority)?;
        validate_non_empty_string("patient.local_id", &self.local_id)
    }
}

/// HL7 CX rendering, as registries expect it in `XDSDocumentEntry.patientId`.
impl fmt::Display for PatientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}^^^&{}&ISO", self.local_id, self.assigning_authority)
    }
}

/// Raw keystore input as it arrives from configuration or a caller.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct KeystoreSettings {
    pub path: Option<PathBuf>,
    pub password: Option<String>,
    #[serde(rename = "type")]
    pub keystore_type: Option<String>,
}

impl fmt::Debug for KeystoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreSettings")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("keystore_type", &self.keystore_type)
            .finish()
    }
}

pub const DEFAULT_KEYSTORE_TYPE: &str = "PEM";

/// Opaque TLS material handed to the transport.
#[derive(Clone)]
pub struct Credentials {
    keystore_path: PathBuf,
    password: String,
    keystore_type: String,
}

impl Credentials {
    pub fn keystore_path(&self) -> &std::path::Path {
        &self.keystore_path
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn keystore_type(&self) -> &str {
        &self.keystore_type
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keystore_path", &self.keystore_path)
            .field("password", &"***")
            .field("keystore_type", &self.keystore_type)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    uri: Url,
    credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// A registry/repository pair plus the organization acting in the domain.
///
/// Built once per logical operation and never mutated afterwards. The registry may be
/// absent for submission-only use, but at least one endpoint is always present.
#[derive(Debug, Clone)]
pub struct AffinityDomain {
    organizational_id: String,
    registry: Option<Endpoint>,
    repository: Option<Endpoint>,
}

impl AffinityDomain {
    pub fn new(
        organizational_id: &str,
        registry_uri: Option<&str>,
        repository_uri: Option<&str>,
        keystore: Option<&KeystoreSettings>,
    ) -> Result<Self> {
        validate_oid("domain.organizational_id", organizational_id)?;

        if registry_uri.is_none() && repository_uri.is_none() {
            return Err(XdsError::config(
                "an affinity domain needs a registry or a repository endpoint",
            ));
        }

        let credentials = keystore.map(credentials_from).transpose()?.flatten();

        let endpoint = |field: &str, uri: &str| -> Result<Endpoint> {
            let uri = validate_url(field, uri)?;
            Ok(Endpoint {
                uri,
                credentials: credentials.clone(),
            })
        };

        let registry = registry_uri
            .map(|uri| endpoint("domain.registry_endpoint", uri))
            .transpose()?;
        let repository = repository_uri
            .map(|uri| endpoint("domain.repository_endpoint", uri))
            .transpose()?;

        Ok(Self {
            organizational_id: organizational_id.to_string(),
            registry,
            repository,
        })
    }

    pub fn organizational_id(&self) -> &str {
        &self.organizational_id
    }

    pub fn registry(&self) -> Option<&Endpoint> {
        self.registry.as_ref()
    }

    pub fn repository(&self) -> Option<&Endpoint> {
        self.repository.as_ref()
    }

    pub fn require_registry(&self) -> Result<&Endpoint> {
        self.registry.as_ref().ok_or_else(|| XdsError::MissingConfigError {
            field: "domain.registry_endpoint".to_string(),
        })
    }

    pub fn require_repository(&self) -> Result<&Endpoint> {
        self.repository.as_ref().ok_or_else(|| XdsError::MissingConfigError {
            field: "domain.repository_endpoint".to_string(),
        })
    }
}

/// An empty keystore path means "no TLS client credentials".
fn credentials_from(settings: &KeystoreSettings) -> Result<Option<Credentials>> {
    let path = match settings.path.as_ref() {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => return Ok(None),
    };

    let password = settings
        .password
        .as_ref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            XdsError::config(format!(
                "keystore '{}' was given without a password",
                path.display()
            ))
        })?;

    Ok(Some(Credentials {
        keystore_path: path.clone(),
        password: password.clone(),
        keystore_type: settings
            .keystore_type
            .clone()
            .unwrap_or_else(|| DEFAULT_KEYSTORE_TYPE.to_string()),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:StatusType:Approved")]
    Approved,
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:StatusType:Submitted")]
    Submitted,
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:StatusType:Deprecated")]
    Deprecated,
}

impl AvailabilityStatus {
    pub fn default_filter() -> Vec<AvailabilityStatus> {
        vec![AvailabilityStatus::Approved]
    }
}

impl std::str::FromStr for AvailabilityStatus {
    type Err = XdsError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.rsplit(':').next().unwrap_or(s);
        match name.to_ascii_lowercase().as_str() {
            "approved" => Ok(AvailabilityStatus::Approved),
            "submitted" => Ok(AvailabilityStatus::Submitted),
            "deprecated" => Ok(AvailabilityStatus::Deprecated),
            _ => Err(XdsError::InvalidConfigValueError {
                field: "status".to_string(),
                value: s.to_string(),
                reason: "expected approved, submitted or deprecated".to_string(),
            }),
        }
    }
}

/// Registry handle for one document, as returned by a stored query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    #[serde(rename = "entryUUID")]
    pub entry_uuid: String,
    pub unique_id: String,
    pub repository_unique_id: String,
    pub mime_type: String,
    pub patient_id: Option<PatientIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "entryUUID")]
    pub entry_uuid: String,
    pub class_code: Code,
    pub type_code: Code,
    pub format_code: Code,
    pub practice_setting_code: Code,
    pub healthcare_facility_type_code: Code,
    pub confidentiality_codes: Vec<Code>,
    pub language_code: String,
    pub mime_type: String,
    pub unique_id: String,
    pub title: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub source_patient_id: Option<PatientIdentifier>,
    pub destination_patient_id: PatientIdentifier,
}

/// A registry document entry: its handle plus the full metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub reference: DocumentReference,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub given_name: String,
    pub family_name: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedDocument {
    #[serde(with = "crate::utils::base64_bytes")]
    pub content: Vec<u8>,
    pub metadata: DocumentMetadata,
}

/// Documents submitted together in one provide-and-register transaction.
///
/// Only `assemble_submission_set` builds one, so `documents` is never empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSet {
    pub(crate) unique_id: String,
    pub(crate) submission_time: DateTime<Utc>,
    pub(crate) author: Option<Author>,
    pub(crate) content_type_code: Code,
    pub(crate) patient_id: PatientIdentifier,
    pub(crate) documents: Vec<SubmittedDocument>,
}

impl SubmissionSet {
    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn submission_time(&self) -> DateTime<Utc> {
        self.submission_time
    }

    pub fn author(&self) -> Option<&Author> {
        self.author.as_ref()
    }

    pub fn content_type_code(&self) -> &Code {
        &self.content_type_code
    }

    pub fn patient_id(&self) -> &PatientIdentifier {
        &self.patient_id
    }

    pub fn documents(&self) -> &[SubmittedDocument] {
        &self.documents
    }
}
