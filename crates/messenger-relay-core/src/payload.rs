use serde::{Deserialize, Serialize};

use crate::envelope::MediaKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("message text can't be empty")]
    EmptyText,
}

/// Body of the send API call: one recipient and exactly one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    pub recipient: Recipient,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Text { text: MessageText },
    Attachment { attachment: MediaAttachment },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageText(String);

impl MessageText {
    pub fn new(text: impl Into<String>) -> Result<Self, PayloadError> {
        let text = text.into();
        if text.is_empty() {
            return Err(PayloadError::EmptyText);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageText {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MessageText::new(value)
    }
}

impl From<MessageText> for String {
    fn from(text: MessageText) -> Self {
        text.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub payload: MediaSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub url: String,
}

impl OutboundPayload {
    pub fn text(recipient: impl Into<String>, text: impl Into<String>) -> Result<Self, PayloadError> {
        Ok(Self {
            recipient: Recipient {
                id: recipient.into(),
            },
            message: OutboundMessage::Text {
                text: MessageText::new(text)?,
            },
        })
    }

    pub fn attachment(
        recipient: impl Into<String>,
        kind: MediaKind,
        url: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Recipient {
                id: recipient.into(),
            },
            message: OutboundMessage::Attachment {
                attachment: MediaAttachment {
                    kind,
                    payload: MediaSource { url: url.into() },
                },
            },
        }
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient.id
    }

    /// Short label for logs: `text` or the media kind.
    pub fn kind(&self) -> &'static str {
        match &self.message {
            OutboundMessage::Text { .. } => "text",
            OutboundMessage::Attachment { attachment } => attachment.kind.as_str(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
