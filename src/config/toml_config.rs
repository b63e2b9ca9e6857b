use crate::core::session::SessionOptions;
use crate::core::submission::CodedAttributes;
use crate::core::{AffinityDomain, Code, PatientIdentifier};
use crate::domain::model::{Author, KeystoreSettings};
use crate::utils::error::{Result, XdsError};
use crate::utils::validation::{
    validate_oid, validate_path, validate_positive_number, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub domain: DomainConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub metadata: CodedAttributes,
    #[serde(default)]
    pub submission: SubmissionConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub organizational_id: String,
    pub registry_endpoint: Option<String>,
    pub repository_endpoint: Option<String>,
    /// Provide-and-register endpoint when it differs from the retrieve endpoint.
    pub submission_endpoint: Option<String>,
    pub keystore: Option<KeystoreSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub output_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    pub deadline_seconds: Option<u64>,
    pub metadata_limit: Option<usize>,
    pub skip_existing: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub content_type_code: Option<Code>,
    pub source_patient_id: Option<PatientIdentifier>,
    pub author: Option<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub json: Option<bool>,
}

impl SessionConfig {
    /// Loads a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(XdsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML after replacing `${VAR}` with environment values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| XdsError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| XdsError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_oid("domain.organizational_id", &self.domain.organizational_id)?;

        for (field, endpoint) in [
            ("domain.registry_endpoint", &self.domain.registry_endpoint),
            ("domain.repository_endpoint", &self.domain.repository_endpoint),
            ("domain.submission_endpoint", &self.domain.submission_endpoint),
        ] {
            if let Some(uri) = endpoint {
                validate_url(field, uri)?;
            }
        }

        if self.domain.registry_endpoint.is_none()
            && self.domain.repository_endpoint.is_none()
            && self.domain.submission_endpoint.is_none()
        {
            return Err(XdsError::MissingConfigError {
                field: "domain.registry_endpoint".to_string(),
            });
        }

        validate_path("storage.output_path", &self.storage.output_path)?;

        if let Some(limit) = self.session.metadata_limit {
            validate_positive_number("session.metadata_limit", limit, 1)?;
        }
        if let Some(seconds) = self.session.deadline_seconds {
            validate_positive_number("session.deadline_seconds", seconds as usize, 1)?;
        }

        if let Some(keystore) = &self.domain.keystore {
            if keystore
                .password
                .as_deref()
                .is_some_and(|p| p.starts_with("${"))
            {
                tracing::warn!("domain.keystore.password references an unset environment variable");
            }
        }

        Ok(())
    }

    /// Registry plus retrieve repository: the consumer side of the domain.
    pub fn query_domain(&self) -> Result<AffinityDomain> {
        AffinityDomain::new(
            &self.domain.organizational_id,
            self.domain.registry_endpoint.as_deref(),
            self.domain.repository_endpoint.as_deref(),
            self.domain.keystore.as_ref(),
        )
    }

    /// Registry plus provide-and-register repository: the source side of the domain.
    pub fn submission_domain(&self) -> Result<AffinityDomain> {
        AffinityDomain::new(
            &self.domain.organizational_id,
            self.domain.registry_endpoint.as_deref(),
            self.domain
                .submission_endpoint
                .as_deref()
                .or(self.domain.repository_endpoint.as_deref()),
            self.domain.keystore.as_ref(),
        )
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            deadline: self.session.deadline_seconds.map(Duration::from_secs),
            metadata_limit: self.session.metadata_limit,
            skip_existing: self.session.skip_existing.unwrap_or(false),
        }
    }

    pub fn output_path(&self) -> &str {
        &self.storage.output_path
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn verbose_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.verbose).unwrap_or(false)
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
