//! Conversation session: message log, the single in-flight request slot,
//! and reconciliation of settled exchanges.
//!
//! All state lives in one [`Session`] owned by the control loop. Exchanges
//! run as spawned tasks that only do I/O; they report back through a
//! [`SessionEvent`] channel and the control loop feeds each event to
//! [`Session::apply`]. Mutation therefore happens in one place, in order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatTransport, RawResponse};
use crate::error::TransportError;
use crate::reply::{self, CANCELLED_TEXT, NETWORK_ERROR_TEXT};

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Backend readiness as reported by the startup probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Warming,
    Ready,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Warming => "warming",
            Status::Ready => "ready",
        }
    }
}

/// Generation number of a submission; unique per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

struct RequestHandle {
    id: RequestId,
    cancel: CancellationToken,
}

/// Terminal outcome of one exchange.
#[derive(Debug)]
pub enum Settlement {
    Response(RawResponse),
    Failed(TransportError),
    Cancelled,
}

#[derive(Debug)]
pub enum SessionEvent {
    Probed(Result<(), TransportError>),
    Settled { id: RequestId, outcome: Settlement },
}

pub struct Session<T: ChatTransport + 'static> {
    transport: Arc<T>,
    events: mpsc::UnboundedSender<SessionEvent>,
    messages: Vec<ChatMessage>,
    slot: Option<RequestHandle>,
    /// Exchanges submitted but not yet settled, superseded ones included.
    outstanding: usize,
    next_id: u64,
    status: Status,
}

impl<T: ChatTransport + 'static> Session<T> {
    /// Create a session and fire the startup probe.
    ///
    /// Must be called inside a tokio runtime. The returned receiver carries
    /// every event the session needs applied.
    pub fn new(transport: T) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Self {
            transport: Arc::new(transport),
            events: tx,
            messages: Vec::new(),
            slot: None,
            outstanding: 0,
            next_id: 0,
            status: Status::Idle,
        };
        session.start_probe();
        (session, rx)
    }

    fn start_probe(&mut self) {
        self.status = Status::Warming;
        let transport = self.transport.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = transport.ping().await;
            let _ = events.send(SessionEvent::Probed(result));
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding > 0
    }

    /// Id of the exchange currently occupying the request slot.
    pub fn live_request(&self) -> Option<RequestId> {
        self.slot.as_ref().map(|h| h.id)
    }

    /// Submit a prompt. Returns `None` (and does nothing) when the prompt is
    /// blank after trimming.
    ///
    /// Any exchange still in flight is cancelled before the new one is
    /// issued; it will settle as [`Settlement::Cancelled`].
    pub fn submit(&mut self, prompt_text: &str) -> Option<RequestId> {
        let prompt = prompt_text.trim();
        if prompt.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage {
            role: ChatRole::User,
            text: prompt.to_string(),
        });

        if let Some(previous) = self.slot.take() {
            tracing::debug!(request = previous.id.0, "superseding in-flight request");
            cancel_quietly(&previous);
        }

        let id = RequestId(self.next_id);
        self.next_id += 1;
        let cancel = CancellationToken::new();
        self.slot = Some(RequestHandle {
            id,
            cancel: cancel.clone(),
        });
        self.outstanding += 1;

        let transport = self.transport.clone();
        let events = self.events.clone();
        let prompt = prompt.to_string();
        tracing::info!(request = id.0, chars = prompt.chars().count(), "sending chat request");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;

                () = cancel.cancelled() => Settlement::Cancelled,

                result = transport.chat(&prompt) => match result {
                    Ok(response) => Settlement::Response(response),
                    Err(e) => Settlement::Failed(e),
                },
            };
            let _ = events.send(SessionEvent::Settled { id, outcome });
        });

        Some(id)
    }

    /// Apply an event produced by this session's tasks. Returns the
    /// assistant message appended, if any.
    pub fn apply(&mut self, event: SessionEvent) -> Option<&ChatMessage> {
        match event {
            SessionEvent::Probed(result) => {
                self.status = match result {
                    Ok(()) => Status::Ready,
                    Err(e) => {
                        tracing::warn!(error = %e, "backend probe failed");
                        Status::Idle
                    }
                };
                None
            }
            SessionEvent::Settled { id, outcome } => {
                // Only an exchange's own settle clears its handle, so a
                // settling id that is not in the slot was superseded. A reply
                // that raced its cancellation is reported as cancelled too.
                let live = self.live_request() == Some(id);
                let outcome = if live { outcome } else { Settlement::Cancelled };
                let text = self.reconcile(id, outcome);
                if live {
                    self.slot = None;
                }
                self.outstanding = self.outstanding.saturating_sub(1);

                self.messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    text,
                });
                self.messages.last()
            }
        }
    }

    fn reconcile(&self, id: RequestId, outcome: Settlement) -> String {
        match outcome {
            Settlement::Response(response) => match reply::extract_reply(&response) {
                Ok(text) => {
                    tracing::info!(request = id.0, status = response.status, "chat request settled");
                    text
                }
                Err(e) => {
                    tracing::warn!(request = id.0, error = %e, "unusable chat response");
                    NETWORK_ERROR_TEXT.to_string()
                }
            },
            Settlement::Failed(e) => {
                tracing::warn!(
                    request = id.0,
                    unreachable = e.is_unreachable(),
                    error = %e,
                    "chat request failed"
                );
                NETWORK_ERROR_TEXT.to_string()
            }
            Settlement::Cancelled => {
                tracing::debug!(request = id.0, "chat request cancelled");
                CANCELLED_TEXT.to_string()
            }
        }
    }
}

impl<T: ChatTransport + 'static> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.take() {
            cancel_quietly(&handle);
        }
    }
}

/// Best-effort cancellation of a superseded request. Nothing is reported
/// back: a task that already holds its response still settles normally and
/// [`Session::apply`] reports that late reply as cancelled.
fn cancel_quietly(handle: &RequestHandle) {
    handle.cancel.cancel();
}
