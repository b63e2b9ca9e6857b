use crate::core::{ErrorDetail, ResponseOutcome, ResponseStatus, Severity, TransportResponse};
use crate::domain::ports::RegistryError;

/// Maps a registry status code to a `ResponseStatus`.
///
/// Accepts full ebRS/IHE URNs (`urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success`,
/// `urn:ihe:iti:2007:ResponseStatusType:PartialSuccess`) or their bare names. Anything
/// missing or unrecognised is a `Failure`.
pub fn classify_status(status: Option<&str>) -> ResponseStatus {
    let Some(raw) = status else {
        return ResponseStatus::Failure;
    };
    let name = raw.trim().rsplit(':').next().unwrap_or_default();

    match name.to_ascii_lowercase().as_str() {
        "success" => ResponseStatus::Success,
        "partialsuccess" => ResponseStatus::PartialSuccess,
        "warning" => ResponseStatus::Warning,
        "error" => ResponseStatus::Error,
        "failure" => ResponseStatus::Failure,
        "unavailable" => ResponseStatus::Unavailable,
        _ => ResponseStatus::Failure,
    }
}

fn classify_severity(severity: Option<&str>) -> Severity {
    match severity {
        Some(s) if s.to_ascii_lowercase().ends_with("warning") => Severity::Warning,
        _ => Severity::Error,
    }
}

fn error_detail(error: &RegistryError) -> ErrorDetail {
    ErrorDetail {
        context: error.code_context.clone().unwrap_or_default(),
        location: error.location.clone().unwrap_or_default(),
        value: error.value.clone().unwrap_or_default(),
        severity: classify_severity(error.severity.as_deref()),
    }
}

/// Turns a transport response into an outcome. Never fails.
///
/// Errors are only extracted for non-success statuses, in the order the registry sent them.
pub fn classify(response: TransportResponse) -> ResponseOutcome {
    let status = classify_status(response.status.as_deref());

    let errors = if status.is_success() {
        Vec::new()
    } else {
        response
            .error_list
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(error_detail)
            .collect()
    };

    ResponseOutcome {
        status,
        errors,
        references: response.references,
        document_entries: response.document_entries,
        attachments: response.attachments,
        transport_error: None,
    }
}

/// Outcome for a call that never produced a response.
pub fn unavailable(reason: impl std::fmt::Display) -> ResponseOutcome {
    let mut outcome = ResponseOutcome::new(ResponseStatus::Unavailable);
    outcome.transport_error = Some(reason.to_string());
    outcome
}
