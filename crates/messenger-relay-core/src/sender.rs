//! Outbound side of the relay: POSTs payloads to the platform send API.
//!
//! [`HttpSender`] talks to the real endpoint. [`RecordingSender`] keeps every
//! call in memory and answers from a queue of canned responses, for tests and
//! for running the relay without touching the platform.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tracing::debug;
use ureq::Agent;

use crate::config::SendEndpoint;
use crate::payload::OutboundPayload;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("deadline exceeded before the request was sent")]
    DeadlineExceeded,
    #[error("failed to send request: {0}")]
    Transport(String),
    #[error("request failed: status {status}, body: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub status: u16,
    pub message_id: Option<String>,
}

pub trait MessageSender: Send + Sync {
    /// Makes a single attempt; the call must not outlive `deadline`.
    fn send(&self, payload: &OutboundPayload, deadline: Instant)
    -> Result<SendReceipt, SendError>;
}

pub struct HttpSender {
    agent: Agent,
    endpoint: SendEndpoint,
}

impl HttpSender {
    pub fn new(endpoint: SendEndpoint) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, endpoint }
    }
}

impl MessageSender for HttpSender {
    fn send(
        &self,
        payload: &OutboundPayload,
        deadline: Instant,
    ) -> Result<SendReceipt, SendError> {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
            .ok_or(SendError::DeadlineExceeded)?;
        let body = payload.to_json_bytes().map_err(SendError::Encode)?;
        debug!(
            recipient = payload.recipient_id(),
            kind = payload.kind(),
            body = %String::from_utf8_lossy(&body),
            "sending payload"
        );

        let mut response = self
            .agent
            .post(self.endpoint.messages_url())
            .config()
            .timeout_global(Some(remaining))
            .build()
            .header("Content-Type", "application/json")
            .send(&body[..])
            .map_err(|err| SendError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string().unwrap_or_default();
        interpret_response(status, &text)
    }
}

fn interpret_response(status: u16, body: &str) -> Result<SendReceipt, SendError> {
    if !(200..300).contains(&status) {
        return Err(SendError::Status {
            status,
            body: body.to_string(),
        });
    }
    let message_id = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
    Ok(SendReceipt { status, message_id })
}

/// Canned answer handed out by [`RecordingSender`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    Status { status: u16, body: String },
    TransportError(String),
}

impl MockResponse {
    pub fn ok() -> Self {
        MockResponse::Status {
            status: 200,
            body: r#"{"recipient_id":"mock","message_id":"mock"}"#.to_string(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        MockResponse::Status {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentCall {
    pub url: String,
    pub payload: OutboundPayload,
}

#[derive(Clone)]
pub struct RecordingSender {
    endpoint: SendEndpoint,
    history: Arc<Mutex<VecDeque<SentCall>>>,
    history_limit: Option<usize>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
}

impl RecordingSender {
    pub fn new(endpoint: SendEndpoint) -> Self {
        Self {
            endpoint,
            history: Arc::new(Mutex::new(VecDeque::new())),
            history_limit: None,
            responses: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Keeps only the most recent `limit` calls.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Queues the answer for the next call; once drained, calls succeed.
    pub fn queue_response(&self, response: MockResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn calls(&self) -> Vec<SentCall> {
        self.history
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, call: SentCall) {
        let Ok(mut calls) = self.history.lock() else {
            return;
        };
        if let Some(limit) = self.history_limit {
            if limit == 0 {
                return;
            }
            while calls.len() >= limit {
                calls.pop_front();
            }
        }
        calls.push_back(call);
    }
}

impl MessageSender for RecordingSender {
    fn send(
        &self,
        payload: &OutboundPayload,
        deadline: Instant,
    ) -> Result<SendReceipt, SendError> {
        if Instant::now() >= deadline {
            return Err(SendError::DeadlineExceeded);
        }
        self.record(SentCall {
            url: self.endpoint.messages_url(),
            payload: payload.clone(),
        });
        debug!(
            recipient = payload.recipient_id(),
            kind = payload.kind(),
            "recorded payload"
        );
        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(MockResponse::ok);
        match response {
            MockResponse::Status { status, body } => interpret_response(status, &body),
            MockResponse::TransportError(message) => Err(SendError::Transport(message)),
        }
    }
}
