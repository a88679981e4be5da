//! Confirmation gate for destructive operations.
//!
//! A flow that needs the operator's consent calls
//! [`ConfirmationGate::confirm_action`] and suspends until the single shared
//! confirmation surface answers through [`ConfirmationGate::confirm`] or
//! [`ConfirmationGate::cancel`]. At most one request is open; opening a new
//! one cancels the previous.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use super::EngineEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmVariant {
    Danger,
    Primary,
    Logout,
}

/// Text and style of a confirmation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmOptions {
    pub message: String,
    pub title: String,
    pub confirm_label: String,
    pub variant: ConfirmVariant,
}

impl ConfirmOptions {
    /// A delete confirmation with the default title and button label.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            title: "Konfirmasi Hapus".to_string(),
            confirm_label: "Ya, Hapus Data".to_string(),
            variant: ConfirmVariant::Danger,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_confirm_label(mut self, label: impl Into<String>) -> Self {
        self.confirm_label = label.into();
        self
    }

    pub fn with_variant(mut self, variant: ConfirmVariant) -> Self {
        self.variant = variant;
        self
    }
}

/// The open prompt, as shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub id: String,
    pub message: String,
    pub title: String,
    pub confirm_label: String,
    pub variant: ConfirmVariant,
}

struct Pending {
    request: ConfirmRequest,
    reply: oneshot::Sender<bool>,
}

pub struct ConfirmationGate {
    pending: Mutex<Option<Pending>>,
    events: broadcast::Sender<EngineEvent>,
}

impl ConfirmationGate {
    pub fn new(events: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            pending: Mutex::new(None),
            events,
        }
    }

    /// Opens a prompt and resolves to the operator's answer. A prompt that
    /// is superseded or dropped resolves to `false`.
    pub async fn confirm_action(&self, options: ConfirmOptions) -> bool {
        let (reply, answer) = oneshot::channel();
        let request = ConfirmRequest {
            id: uuid::Uuid::new_v4().to_string(),
            message: options.message,
            title: options.title,
            confirm_label: options.confirm_label,
            variant: options.variant,
        };

        let previous = self.pending.lock().replace(Pending {
            request: request.clone(),
            reply,
        });
        if let Some(previous) = previous {
            self.finish(previous, false);
        }

        debug!("Confirmation requested: {}", request.title);
        let _ = self.events.send(EngineEvent::ConfirmRequested { request });
        answer.await.unwrap_or(false)
    }

    /// Accepts the open prompt. Returns false when none is open.
    pub fn confirm(&self) -> bool {
        self.resolve(true)
    }

    /// Declines the open prompt. Returns false when none is open.
    pub fn cancel(&self) -> bool {
        self.resolve(false)
    }

    /// The open prompt, if any.
    pub fn current(&self) -> Option<ConfirmRequest> {
        self.pending.lock().as_ref().map(|p| p.request.clone())
    }

    pub fn is_open(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn resolve(&self, confirmed: bool) -> bool {
        let pending = self.pending.lock().take();
        match pending {
            Some(pending) => {
                self.finish(pending, confirmed);
                true
            }
            None => false,
        }
    }

    fn finish(&self, pending: Pending, confirmed: bool) {
        let id = pending.request.id.clone();
        let _ = pending.reply.send(confirmed);
        let _ = self.events.send(EngineEvent::ConfirmResolved { id, confirmed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn gate() -> (Arc<ConfirmationGate>, broadcast::Receiver<EngineEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (Arc::new(ConfirmationGate::new(tx)), rx)
    }

    async fn wait_open(gate: &ConfirmationGate) {
        while !gate.is_open() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_confirm_resolves_true() {
        let (gate, mut rx) = gate();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm_action(ConfirmOptions::new("Hapus?")).await })
        };

        wait_open(&gate).await;
        let request = gate.current().unwrap();
        assert_eq!(request.title, "Konfirmasi Hapus");
        assert_eq!(request.confirm_label, "Ya, Hapus Data");
        assert_eq!(request.variant, ConfirmVariant::Danger);

        assert!(gate.confirm());
        assert!(waiter.await.unwrap());
        assert!(!gate.is_open());

        assert!(matches!(rx.recv().await.unwrap(), EngineEvent::ConfirmRequested { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::ConfirmResolved { confirmed: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_resolves_false() {
        let (gate, _rx) = gate();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.confirm_action(
                    ConfirmOptions::new("Bersihkan?")
                        .with_title("Pembersihan Database")
                        .with_confirm_label("Ya, Bersihkan"),
                )
                .await
            })
        };

        wait_open(&gate).await;
        assert_eq!(gate.current().unwrap().title, "Pembersihan Database");
        assert!(gate.cancel());
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_resolving_without_prompt() {
        let (gate, _rx) = gate();
        assert!(!gate.confirm());
        assert!(!gate.cancel());
        assert!(gate.current().is_none());
    }

    #[tokio::test]
    async fn test_new_prompt_supersedes_old() {
        let (gate, _rx) = gate();
        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm_action(ConfirmOptions::new("satu")).await })
        };
        wait_open(&gate).await;

        let second = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.confirm_action(ConfirmOptions::new("dua")).await })
        };

        assert!(!first.await.unwrap());
        wait_open(&gate).await;
        assert_eq!(gate.current().unwrap().message, "dua");
        gate.confirm();
        assert!(second.await.unwrap());
    }
}
