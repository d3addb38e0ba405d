//! Inbound webhook envelope as delivered by the messaging platform.
//!
//! Only `entry` is mandatory. Everything else falls back to its default so
//! that delivery receipts, reads and postbacks decode too; the dispatcher
//! decides what is worth answering. Unknown fields are ignored, and a
//! field sent as `null` reads the same as an absent one.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("invalid webhook envelope: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub object: Option<String>,
    pub entry: Vec<Entry>,
}

impl InboundEnvelope {
    /// Every messaging event of every entry, in delivery order.
    pub fn events(&self) -> impl Iterator<Item = &MessagingEvent> {
        self.entry.iter().flat_map(|entry| entry.messaging.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Entry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MessagingEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: Participant,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipient: Participant,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: MessageBody,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Participant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MessageBody {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: AttachmentType,
    #[serde(default)]
    pub payload: Option<AttachmentSource>,
}

impl Attachment {
    pub fn url(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|payload| payload.url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AttachmentSource {
    #[serde(default)]
    pub url: Option<String>,
}

/// Attachment kinds the send API accepts back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    File,
}

impl MediaKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            "file" => Some(MediaKind::File),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum AttachmentType {
    Media(MediaKind),
    Unsupported(String),
}

impl Default for AttachmentType {
    /// An attachment without a `type` is treated as an unsupported kind.
    fn default() -> Self {
        AttachmentType::Unsupported(String::new())
    }
}

impl From<String> for AttachmentType {
    fn from(tag: String) -> Self {
        match MediaKind::parse(&tag) {
            Some(kind) => AttachmentType::Media(kind),
            None => AttachmentType::Unsupported(tag),
        }
    }
}

impl From<AttachmentType> for String {
    fn from(kind: AttachmentType) -> Self {
        match kind {
            AttachmentType::Media(kind) => kind.as_str().to_string(),
            AttachmentType::Unsupported(tag) => tag,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn decode_envelope(bytes: &[u8]) -> Result<InboundEnvelope, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}
