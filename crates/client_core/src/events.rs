use rust_decimal::Decimal;
use shared::{domain::WorkId, error::ApiFailure};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::{RequestInFlight, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Notice { level: NoticeLevel, message: String },
    /// A payment is stored but the work order budget is stale and needs a
    /// manual re-sync.
    ReconciliationRequired {
        work_id: WorkId,
        expected_budget: Decimal,
    },
    SessionEnded,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    events: broadcast::Sender<ClientEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn send(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(ClientEvent::Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        });
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(ClientEvent::Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ClientEvent::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        });
    }

    /// Emits the success toast or the failure toast for `result` and hands the
    /// result back unchanged.
    pub fn report<T>(
        &self,
        result: anyhow::Result<T>,
        success: &str,
        failure: &str,
    ) -> anyhow::Result<T> {
        match &result {
            Ok(_) => {
                if !success.is_empty() {
                    self.success(success);
                }
            }
            Err(err) if err.downcast_ref::<RequestInFlight>().is_some() => {
                info!(error = %err, "client: duplicate request ignored");
                self.warning(user_message(err, failure));
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "client: {failure}");
                self.error(user_message(err, failure));
            }
        }
        result
    }
}

/// Message shown to the user for `err`: the validation reason or the server's
/// own message when there is one, `fallback` otherwise.
pub fn user_message(err: &anyhow::Error, fallback: &str) -> String {
    if let Some(validation) = err.downcast_ref::<ValidationError>() {
        return validation.to_string();
    }
    if let Some(in_flight) = err.downcast_ref::<RequestInFlight>() {
        return in_flight.to_string();
    }
    if let Some(failure) = err.downcast_ref::<ApiFailure>() {
        return failure.message.clone();
    }
    fallback.to_string()
}
