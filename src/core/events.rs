use crate::core::ResponseStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventOutcome {
    Succeeded,
    Degraded,
    Failed,
}

impl From<ResponseStatus> for EventOutcome {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Success => EventOutcome::Succeeded,
            ResponseStatus::Warning | ResponseStatus::PartialSuccess => EventOutcome::Degraded,
            _ => EventOutcome::Failed,
        }
    }
}

/// One step of a workflow: which operation ran, how it ended, and a human message.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub at: DateTime<Utc>,
    pub operation: &'static str,
    pub outcome: EventOutcome,
    pub message: String,
}

/// Per-call event log, also mirrored to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<SessionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        operation: &'static str,
        outcome: impl Into<EventOutcome>,
        message: impl Into<String>,
    ) {
        let outcome = outcome.into();
        let message = message.into();

        match outcome {
            EventOutcome::Succeeded => tracing::info!(operation, "{}", message),
            EventOutcome::Degraded => tracing::warn!(operation, "{}", message),
            EventOutcome::Failed => tracing::error!(operation, "{}", message),
        }

        self.events.push(SessionEvent {
            at: Utc::now(),
            operation,
            outcome,
            message,
        });
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SessionEvent> {
        self.events
    }
}
