use std::fmt;
use std::time::Duration;

pub const DEFAULT_REPLY_PREFIX: &str = "▄︻デ══━一💥 :  ";
pub const DEFAULT_IMAGE_PLACEHOLDER_URL: &str = "https://i.gifer.com/Ifph.gif";
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// How the reply text is derived from an inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTransform {
    Prefix(String),
    Echo,
    Fixed(String),
}

impl ReplyTransform {
    pub fn apply(&self, inbound: &str) -> String {
        match self {
            ReplyTransform::Prefix(prefix) => format!("{prefix}{inbound}"),
            ReplyTransform::Echo => inbound.to_string(),
            ReplyTransform::Fixed(text) => text.clone(),
        }
    }
}

impl Default for ReplyTransform {
    fn default() -> Self {
        ReplyTransform::Prefix(DEFAULT_REPLY_PREFIX.to_string())
    }
}

/// Which URL an inbound image attachment is answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageForwarding {
    Placeholder(String),
    Inbound,
}

impl Default for ImageForwarding {
    fn default() -> Self {
        ImageForwarding::Placeholder(DEFAULT_IMAGE_PLACEHOLDER_URL.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub reply: ReplyTransform,
    pub image: ImageForwarding,
}

/// Base URL and page access token of the platform send API.
#[derive(Clone)]
pub struct SendEndpoint {
    pub base_url: String,
    pub access_token: String,
}

impl SendEndpoint {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/me/messages?access_token={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.access_token)
        )
    }
}

impl fmt::Debug for SendEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendEndpoint")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Immutable settings shared by every inbound request.
#[derive(Clone)]
pub struct RelayConfig {
    pub send_endpoint: SendEndpoint,
    pub verify_token: String,
    pub app_secret: Vec<u8>,
    pub policy: DispatchPolicy,
    pub send_timeout: Duration,
}

impl RelayConfig {
    pub fn new(
        send_endpoint: SendEndpoint,
        verify_token: impl Into<String>,
        app_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            send_endpoint,
            verify_token: verify_token.into(),
            app_secret: app_secret.into(),
            policy: DispatchPolicy::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("send_endpoint", &self.send_endpoint)
            .field("verify_token", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("policy", &self.policy)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}
