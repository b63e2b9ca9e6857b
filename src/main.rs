use clap::Parser;
use serde::Serialize;
use xds_connector::config::cli::{Cli, Command};
use xds_connector::utils::logger;
use xds_connector::utils::validation::{validate_required_field, Validate};
use xds_connector::{
    assemble_submission_set, build_metadata, AvailabilityStatus, DocumentSharingSession,
    HttpTransport, LocalStorage, NewDocument, PatientIds, Result, SessionConfig, XdsError,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let loaded = SessionConfig::from_file(&cli.config);

    let (verbose, json) = match &loaded {
        Ok(config) => (
            cli.verbose || config.verbose_logs(),
            cli.json_logs || config.json_logs(),
        ),
        Err(_) => (cli.verbose, cli.json_logs),
    };
    if json {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting xds-connector CLI");

    let result = match loaded {
        Ok(mut config) => {
            cli.apply_overrides(&mut config);
            if verbose {
                tracing::debug!("Session config: {:?}", config);
            }
            run(cli.command, config).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            std::process::exit(e.exit_code());
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs one command; `Ok(false)` when the registry or repository reported a failure status.
async fn run(command: Command, config: SessionConfig) -> Result<bool> {
    config.validate()?;

    let storage = LocalStorage::new(config.output_path());
    let session = DocumentSharingSession::new(HttpTransport::new(), storage)
        .with_options(config.session_options());

    match command {
        Command::Query {
            patient, status, ..
        } => {
            let domain = config.query_domain()?;
            let status = if status.is_empty() {
                AvailabilityStatus::default_filter()
            } else {
                status
            };

            let outcome = session
                .query(&domain, &patient.identifier(), &status)
                .await?;
            print_json(&outcome)?;
            Ok(outcome.is_success())
        }
        Command::Download {
            patient,
            destination,
            ..
        } => {
            let domain = config.query_domain()?;
            let report = session
                .download_patient_documents(&domain, &patient.identifier(), destination.as_deref())
                .await?;

            tracing::info!(
                "✅ Stored {} documents, {} failed",
                report.stored.len(),
                report.failures.len()
            );
            print_json(&report)?;
            Ok(report.outcome.is_success() && report.failures.is_empty())
        }
        Command::Fetch {
            patient,
            unique_id,
            destination,
        } => {
            let domain = config.query_domain()?;
            let stored = session
                .fetch_document_by_unique_id(
                    &domain,
                    &patient.identifier(),
                    &unique_id,
                    destination.as_deref(),
                )
                .await?;

            print_json(&serde_json::json!({
                "uniqueId": unique_id,
                "stored": stored,
            }))?;
            Ok(stored.is_some())
        }
        Command::Exists { patient, unique_id } => {
            let domain = config.query_domain()?;
            let exists = session
                .exists_by_unique_id(&domain, &patient.identifier(), &unique_id)
                .await?;

            print_json(&serde_json::json!({
                "uniqueId": unique_id,
                "exists": exists,
            }))?;
            Ok(true)
        }
        Command::Submit {
            patient,
            file,
            unique_id,
            generate_id,
            mime_type,
            title,
            allow_duplicate,
        } => {
            let domain = config.submission_domain()?;
            let content_type_code = validate_required_field(
                "submission.content_type_code",
                &config.submission.content_type_code,
            )?
            .clone();

            let content = tokio::fs::read(&file).await.map_err(|e| {
                XdsError::validation(format!("cannot read '{}': {}", file.display(), e))
            })?;

            let mut document = NewDocument::new(content);
            if let Some(mime_type) = mime_type {
                document = document.with_mime_type(mime_type);
            }
            document = match unique_id {
                Some(unique_id) => document.with_unique_id(unique_id),
                None if generate_id => document.with_generated_unique_id(),
                None => document,
            };

            let mut attributes = config.metadata.clone();
            if title.is_some() {
                attributes.title = title;
            }
            let patient_ids = PatientIds {
                destination: Some(patient.identifier()),
                source: config.submission.source_patient_id.clone(),
            };

            let metadata = build_metadata(&document, &patient_ids, &attributes)?;
            let mut submission_set =
                assemble_submission_set(content_type_code, vec![(document.content, metadata)])?;
            if let Some(author) = config.submission.author.clone() {
                submission_set = submission_set.with_author(author);
            }

            let outcome = if allow_duplicate {
                session.submit(&domain, &submission_set).await?
            } else {
                session
                    .submit_new_document(&domain, &submission_set)
                    .await?
            };

            print_json(&outcome)?;
            Ok(outcome.is_success())
        }
    }
}
