use crate::config::toml_config::SessionConfig;
use crate::core::{AvailabilityStatus, PatientIdentifier};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "xds-connector")]
#[command(about = "Query, retrieve and submit documents in an XDS affinity domain")]
pub struct Cli {
    #[arg(short, long, default_value = "xds-connector.toml")]
    pub config: PathBuf,

    #[arg(long, help = "Override storage.output_path")]
    pub output_path: Option<String>,

    #[arg(long, help = "Override session.deadline_seconds")]
    pub deadline_seconds: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct PatientArgs {
    /// Assigning authority OID of the patient id.
    #[arg(long)]
    pub authority: String,

    #[arg(long)]
    pub patient_id: String,
}

impl PatientArgs {
    pub fn identifier(&self) -> PatientIdentifier {
        PatientIdentifier::new(&self.authority, &self.patient_id)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the patient's documents with their metadata.
    Query {
        #[command(flatten)]
        patient: PatientArgs,

        #[arg(long, value_delimiter = ',')]
        status: Vec<AvailabilityStatus>,

        #[arg(long, help = "Resolve metadata for the N most recent documents only")]
        limit: Option<usize>,
    },
    /// Retrieve and store every document of the patient.
    Download {
        #[command(flatten)]
        patient: PatientArgs,

        #[arg(long, help = "Subdirectory of the output path")]
        destination: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        skip_existing: bool,
    },
    /// Retrieve and store a single document by uniqueId.
    Fetch {
        #[command(flatten)]
        patient: PatientArgs,

        #[arg(long)]
        unique_id: String,

        #[arg(long)]
        destination: Option<String>,
    },
    /// Check whether the registry lists a document uniqueId for the patient.
    Exists {
        #[command(flatten)]
        patient: PatientArgs,

        #[arg(long)]
        unique_id: String,
    },
    /// Submit a document to the repository.
    Submit {
        #[command(flatten)]
        patient: PatientArgs,

        #[arg(long)]
        file: PathBuf,

        #[arg(long, conflicts_with = "generate_id")]
        unique_id: Option<String>,

        #[arg(long)]
        generate_id: bool,

        #[arg(long)]
        mime_type: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, help = "Submit without checking the registry for the uniqueId")]
        allow_duplicate: bool,
    },
}

impl Cli {
    /// Command line values win over the configuration file.
    pub fn apply_overrides(&self, config: &mut SessionConfig) {
        if let Some(output_path) = &self.output_path {
            config.storage.output_path = output_path.clone();
        }
        if let Some(seconds) = self.deadline_seconds {
            config.session.deadline_seconds = Some(seconds);
        }
        match &self.command {
            Command::Query { limit, .. } => {
                if limit.is_some() {
                    config.session.metadata_limit = *limit;
                }
            }
            Command::Download {
                limit,
                skip_existing,
                ..
            } => {
                if limit.is_some() {
                    config.session.metadata_limit = *limit;
                }
                if *skip_existing {
                    config.session.skip_existing = Some(true);
                }
            }
            _ => {}
        }
    }
}
