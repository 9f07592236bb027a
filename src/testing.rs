//! Scripted transport for session tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend::{ChatTransport, RawResponse};
use crate::error::TransportError;

enum Scripted {
    Respond {
        response: RawResponse,
        gate: Option<Arc<Notify>>,
    },
    Fail,
}

#[derive(Default)]
struct Inner {
    script: HashMap<String, Scripted>,
    prompts: Vec<String>,
    ping_fails: bool,
}

/// Answers chat requests according to a per-prompt script. Unscripted
/// prompts get a 404 with an empty body.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prompt: &str, status: u16, body: &str) {
        self.inner.lock().unwrap().script.insert(
            prompt.to_string(),
            Scripted::Respond {
                response: RawResponse::new(status, body),
                gate: None,
            },
        );
    }

    /// Like [`respond`](Self::respond), but the exchange stays open until the
    /// returned gate is notified.
    pub fn respond_held(&self, prompt: &str, status: u16, body: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().script.insert(
            prompt.to_string(),
            Scripted::Respond {
                response: RawResponse::new(status, body),
                gate: Some(gate.clone()),
            },
        );
        gate
    }

    pub fn fail(&self, prompt: &str) {
        self.inner
            .lock()
            .unwrap()
            .script
            .insert(prompt.to_string(), Scripted::Fail);
    }

    pub fn fail_ping(&self) {
        self.inner.lock().unwrap().ping_fails = true;
    }

    /// Prompts that reached the transport, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.inner.lock().unwrap().prompts.clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn ping(&self) -> Result<(), TransportError> {
        if self.inner.lock().unwrap().ping_fails {
            return Err(TransportError::connect("mock://ping", "connection refused"));
        }
        Ok(())
    }

    async fn chat(&self, prompt: &str) -> Result<RawResponse, TransportError> {
        let (response, gate) = {
            let mut inner = self.inner.lock().unwrap();
            inner.prompts.push(prompt.to_string());
            match inner.script.get(prompt) {
                Some(Scripted::Respond { response, gate }) => (response.clone(), gate.clone()),
                Some(Scripted::Fail) => {
                    return Err(TransportError::connect("mock://chat", "connection reset"))
                }
                None => (RawResponse::new(404, ""), None),
            }
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(response)
    }
}
