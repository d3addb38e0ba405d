use tracing::{debug, warn};

use crate::config::{DispatchPolicy, ImageForwarding};
use crate::envelope::{Attachment, AttachmentType, MediaKind, MessagingEvent};
use crate::payload::OutboundPayload;

/// Turns one inbound messaging event into the replies the relay sends back.
///
/// Echoes of the page's own sends never produce anything. A non-empty text
/// produces one reply built by the configured [`ReplyTransform`], followed by
/// one forward per supported attachment. Unsupported attachment kinds are
/// dropped.
///
/// [`ReplyTransform`]: crate::config::ReplyTransform
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn dispatch(&self, event: &MessagingEvent) -> Vec<OutboundPayload> {
        let message = &event.message;
        if message.is_echo {
            debug!(mid = ?message.mid, "ignoring echo message");
            return Vec::new();
        }
        let sender = event.sender.id.as_str();
        if sender.is_empty() {
            debug!(mid = ?message.mid, "ignoring event without sender id");
            return Vec::new();
        }

        let mut payloads = Vec::new();
        if let Some(text) = message.text.as_deref().filter(|text| !text.is_empty()) {
            let reply = self.policy.reply.apply(text);
            match OutboundPayload::text(sender, reply) {
                Ok(payload) => payloads.push(payload),
                Err(err) => warn!(sender, %err, "reply transform produced no text"),
            }
        }
        for attachment in &message.attachments {
            if let Some(payload) = self.forward_attachment(sender, attachment) {
                payloads.push(payload);
            }
        }
        payloads
    }

    fn forward_attachment(&self, sender: &str, attachment: &Attachment) -> Option<OutboundPayload> {
        let kind = match &attachment.kind {
            AttachmentType::Media(kind) => *kind,
            AttachmentType::Unsupported(tag) => {
                warn!(sender, kind = %tag, "received an unsupported attachment");
                return None;
            }
        };
        let url = match (kind, &self.policy.image) {
            (MediaKind::Image, ImageForwarding::Placeholder(url)) => Some(url.as_str()),
            _ => attachment.url(),
        };
        match url {
            Some(url) => Some(OutboundPayload::attachment(sender, kind, url)),
            None => {
                warn!(sender, kind = kind.as_str(), "attachment has no payload url");
                None
            }
        }
    }
}
