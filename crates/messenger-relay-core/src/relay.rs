use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::envelope::{DecodeError, decode_envelope};
use crate::sender::MessageSender;
use crate::signature::verify_signature;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("webhook verification failed: {0}")]
    Verification(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl RelayError {
    /// HTTP status the endpoint answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Verification(_) => 403,
            RelayError::Decode(_) => 400,
        }
    }
}

/// Outcome of one delivery. Failed sends are counted, never surfaced to the
/// platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub events: usize,
    pub sent: usize,
    pub failed: usize,
    pub abandoned: usize,
}

#[derive(Clone)]
pub struct WebhookRelay {
    config: Arc<RelayConfig>,
    dispatcher: Dispatcher,
    sender: Arc<dyn MessageSender>,
}

impl WebhookRelay {
    pub fn new(config: Arc<RelayConfig>, sender: Arc<dyn MessageSender>) -> Self {
        let dispatcher = Dispatcher::new(config.policy.clone());
        Self {
            config,
            dispatcher,
            sender,
        }
    }

    /// Subscription handshake: echoes the challenge back when the token
    /// matches the configured verify token.
    pub fn verify_subscription(
        &self,
        verify_token: Option<&str>,
        challenge: Option<&str>,
    ) -> Result<String, RelayError> {
        match verify_token {
            Some(token) if token == self.config.verify_token => {
                Ok(challenge.unwrap_or_default().to_string())
            }
            _ => Err(RelayError::Verification("verify token mismatch")),
        }
    }

    /// Verifies, decodes and answers one webhook delivery.
    ///
    /// Events are handled in order. When a send fails the remaining payloads
    /// of that event are abandoned and the next event is processed.
    pub fn handle_delivery(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<DeliveryReport, RelayError> {
        let deadline = Instant::now() + self.config.send_timeout;
        let signature =
            signature.ok_or(RelayError::Verification("missing signature header"))?;
        if !verify_signature(body, signature, &self.config.app_secret) {
            return Err(RelayError::Verification("invalid signature"));
        }
        let envelope = decode_envelope(body)?;

        let mut report = DeliveryReport::default();
        for event in envelope.events() {
            report.events += 1;
            let payloads = self.dispatcher.dispatch(event);
            let total = payloads.len();
            for (index, payload) in payloads.iter().enumerate() {
                match self.sender.send(payload, deadline) {
                    Ok(receipt) => {
                        report.sent += 1;
                        debug!(
                            recipient = payload.recipient_id(),
                            kind = payload.kind(),
                            status = receipt.status,
                            message_id = ?receipt.message_id,
                            "payload delivered"
                        );
                    }
                    Err(err) => {
                        report.failed += 1;
                        report.abandoned += total - index - 1;
                        warn!(
                            recipient = payload.recipient_id(),
                            kind = payload.kind(),
                            %err,
                            "failed to send message"
                        );
                        break;
                    }
                }
            }
        }
        info!(
            events = report.events,
            sent = report.sent,
            failed = report.failed,
            abandoned = report.abandoned,
            "webhook delivery processed"
        );
        Ok(report)
    }
}
