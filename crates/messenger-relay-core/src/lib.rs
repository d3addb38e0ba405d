//! Core of the messenger webhook relay.
//!
//! Inbound deliveries are verified against the app secret, decoded into an
//! [`InboundEnvelope`], turned into [`OutboundPayload`]s by the [`Dispatcher`]
//! and handed to a [`MessageSender`]. [`WebhookRelay`] binds the steps
//! together for one inbound request.

pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod payload;
pub mod relay;
pub mod sender;
pub mod signature;

pub use config::{
    DEFAULT_IMAGE_PLACEHOLDER_URL, DEFAULT_REPLY_PREFIX, DEFAULT_SEND_TIMEOUT, DispatchPolicy,
    ImageForwarding, RelayConfig, ReplyTransform, SendEndpoint,
};
pub use dispatch::Dispatcher;
pub use envelope::{
    Attachment, AttachmentType, DecodeError, Entry, InboundEnvelope, MediaKind, MessageBody,
    MessagingEvent, Participant, decode_envelope,
};
pub use payload::{
    MediaAttachment, MediaSource, MessageText, OutboundMessage, OutboundPayload, PayloadError,
    Recipient,
};
pub use relay::{DeliveryReport, RelayError, WebhookRelay};
pub use sender::{
    HttpSender, MessageSender, MockResponse, RecordingSender, SendError, SendReceipt, SentCall,
};
pub use signature::{SIGNATURE_HEADER, sign_payload, verify_signature};
