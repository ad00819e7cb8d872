//! Confirmation channels for `REQUIRE_CONFIRMATION` decisions.
//!
//! The gate suspends on [`Confirmer::confirm`] and nowhere else. Anything
//! other than an explicit grant resolves to denial: a closed channel, a
//! dropped responder, or a timeout enforced by the gate.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::gate::ActionClass;

/// What the calling context is asked to approve.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    pub tool_name: String,
    pub action_class: ActionClass,
    pub rationale: String,
    /// Parameters with sensitive values redacted.
    pub params: serde_json::Value,
    /// Sequence of the pending audit record.
    pub audit_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationResponse {
    Granted,
    Denied { reason: String },
}

impl ConfirmationResponse {
    pub fn denied(reason: impl Into<String>) -> Self {
        ConfirmationResponse::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, ConfirmationResponse::Granted)
    }
}

/// Asynchronous confirmation channel supplied by the calling context.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResponse;
}

/// Denies every request. Used when no human-in-the-loop channel exists.
#[derive(Debug, Default)]
pub struct DenyAllConfirmer;

#[async_trait]
impl Confirmer for DenyAllConfirmer {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResponse {
        tracing::debug!(tool_name = %request.tool_name, "No confirmation channel, denying");
        ConfirmationResponse::denied("no confirmation channel configured")
    }
}

/// A pending confirmation handed to the human-in-the-loop side.
///
/// Dropping it without answering cancels the request, which the gate treats
/// as a denial.
#[derive(Debug)]
pub struct ConfirmationPrompt {
    pub request: ConfirmationRequest,
    responder: oneshot::Sender<ConfirmationResponse>,
}

impl ConfirmationPrompt {
    pub fn grant(self) {
        let _ = self.responder.send(ConfirmationResponse::Granted);
    }

    pub fn deny(self, reason: impl Into<String>) {
        let _ = self.responder.send(ConfirmationResponse::denied(reason));
    }

    /// Explicit cancellation; equivalent to dropping the prompt.
    pub fn cancel(self) {
        drop(self);
    }
}

/// Forwards requests over an mpsc channel; each carries a oneshot responder.
#[derive(Debug, Clone)]
pub struct ChannelConfirmer {
    tx: mpsc::Sender<ConfirmationPrompt>,
}

impl ChannelConfirmer {
    /// Create a confirmer and the receiving end the caller must service.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConfirmationPrompt>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Confirmer for ChannelConfirmer {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationResponse {
        let (responder, response) = oneshot::channel();
        let prompt = ConfirmationPrompt {
            request,
            responder,
        };
        if self.tx.send(prompt).await.is_err() {
            return ConfirmationResponse::denied("confirmation channel closed");
        }
        response
            .await
            .unwrap_or_else(|_| ConfirmationResponse::denied("confirmation cancelled"))
    }
}
