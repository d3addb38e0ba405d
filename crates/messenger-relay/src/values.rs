use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use messenger_relay_core::{
    DEFAULT_IMAGE_PLACEHOLDER_URL, DEFAULT_REPLY_PREFIX, DEFAULT_SEND_TIMEOUT, DispatchPolicy,
    ImageForwarding, RelayConfig, ReplyTransform, SendEndpoint,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const API_BASE_URL: &str = "api_base_url";
pub const REPLY_MODE: &str = "reply_mode";
pub const REPLY_PREFIX: &str = "reply_prefix";
pub const REPLY_TEXT: &str = "reply_text";
pub const IMAGE_MODE: &str = "image_mode";
pub const IMAGE_PLACEHOLDER_URL: &str = "image_placeholder_url";
pub const SEND_TIMEOUT_MS: &str = "send_timeout_ms";

pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const VERIFY_TOKEN: &str = "VERIFY_TOKEN";
pub const APP_SECRET: &str = "FACEBOOK_APP_SECRET";

/// Config keys and the environment variables they are read from.
pub const CONFIG_ENV: &[(&str, &str)] = &[
    (API_BASE_URL, "GRAPHQL_URL"),
    (REPLY_MODE, "RELAY_REPLY_MODE"),
    (REPLY_PREFIX, "RELAY_REPLY_PREFIX"),
    (REPLY_TEXT, "RELAY_REPLY_TEXT"),
    (IMAGE_MODE, "RELAY_IMAGE_MODE"),
    (IMAGE_PLACEHOLDER_URL, "RELAY_IMAGE_PLACEHOLDER_URL"),
    (SEND_TIMEOUT_MS, "RELAY_SEND_TIMEOUT_MS"),
];
pub const SECRET_KEYS: &[&str] = &[ACCESS_TOKEN, VERIFY_TOKEN, APP_SECRET];
pub const HTTP_MODE_ENV: &str = "RELAY_HTTP_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMode {
    Real,
    Mock,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("missing required value {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?} (expected {expected})")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Relay settings: config, secrets and the outbound http mode.
///
/// Read from the environment and optionally overridden by a JSON values file
/// of the same shape.
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct Values {
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub secrets: Map<String, Value>,
    #[serde(default)]
    pub http: Option<String>,
}

impl Values {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read values file {}", path.as_ref().display()))?;
        let values: Values = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.as_ref().display()))?;
        Ok(values)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut values = Values::default();
        for &(key, env) in CONFIG_ENV {
            if let Some(value) = lookup(env) {
                values.config.insert(key.to_string(), Value::String(value));
            }
        }
        for &key in SECRET_KEYS {
            if let Some(value) = lookup(key) {
                values.secrets.insert(key.to_string(), Value::String(value));
            }
        }
        values.http = lookup(HTTP_MODE_ENV);
        values
    }

    /// Entries present in `other` win.
    pub fn merge(&mut self, other: Values) {
        self.config.extend(other.config);
        self.secrets.extend(other.secrets);
        if other.http.is_some() {
            self.http = other.http;
        }
    }

    pub fn http_mode(&self) -> HttpMode {
        match self
            .http
            .as_deref()
            .unwrap_or("real")
            .to_ascii_lowercase()
            .as_str()
        {
            "mock" => HttpMode::Mock,
            _ => HttpMode::Real,
        }
    }

    pub fn config_str(&self, key: &str) -> Option<String> {
        self.config.get(key).and_then(value_to_string)
    }

    pub fn secret_str(&self, key: &str) -> Option<String> {
        self.secrets.get(key).and_then(value_to_string)
    }

    pub fn dispatch_policy(&self) -> Result<DispatchPolicy, SettingsError> {
        let reply = match self.config_str(REPLY_MODE).as_deref() {
            None | Some("prefix") => ReplyTransform::Prefix(
                self.config_str(REPLY_PREFIX)
                    .unwrap_or_else(|| DEFAULT_REPLY_PREFIX.to_string()),
            ),
            Some("echo") => ReplyTransform::Echo,
            Some("fixed") => ReplyTransform::Fixed(
                self.config_str(REPLY_TEXT)
                    .ok_or(SettingsError::Missing(REPLY_TEXT))?,
            ),
            Some(other) => {
                return Err(SettingsError::Invalid {
                    key: REPLY_MODE,
                    value: other.to_string(),
                    expected: "prefix, echo or fixed",
                });
            }
        };
        let image = match self.config_str(IMAGE_MODE).as_deref() {
            None | Some("placeholder") => ImageForwarding::Placeholder(
                self.config_str(IMAGE_PLACEHOLDER_URL)
                    .unwrap_or_else(|| DEFAULT_IMAGE_PLACEHOLDER_URL.to_string()),
            ),
            Some("inbound") => ImageForwarding::Inbound,
            Some(other) => {
                return Err(SettingsError::Invalid {
                    key: IMAGE_MODE,
                    value: other.to_string(),
                    expected: "placeholder or inbound",
                });
            }
        };
        Ok(DispatchPolicy { reply, image })
    }

    pub fn send_timeout(&self) -> Result<Duration, SettingsError> {
        match self.config_str(SEND_TIMEOUT_MS) {
            None => Ok(DEFAULT_SEND_TIMEOUT),
            Some(raw) => {
                let millis = raw.trim().parse::<u64>().ok().filter(|millis| *millis > 0);
                match millis {
                    Some(millis) => Ok(Duration::from_millis(millis)),
                    None => Err(SettingsError::Invalid {
                        key: SEND_TIMEOUT_MS,
                        value: raw,
                        expected: "a positive number of milliseconds",
                    }),
                }
            }
        }
    }

    pub fn relay_config(&self) -> Result<RelayConfig, SettingsError> {
        let base_url = self
            .config_str(API_BASE_URL)
            .ok_or(SettingsError::Missing(API_BASE_URL))?;
        let access_token = self
            .secret_str(ACCESS_TOKEN)
            .ok_or(SettingsError::Missing(ACCESS_TOKEN))?;
        let verify_token = self
            .secret_str(VERIFY_TOKEN)
            .ok_or(SettingsError::Missing(VERIFY_TOKEN))?;
        let app_secret = self
            .secret_str(APP_SECRET)
            .ok_or(SettingsError::Missing(APP_SECRET))?;
        Ok(RelayConfig::new(
            SendEndpoint::new(base_url, access_token),
            verify_token,
            app_secret.into_bytes(),
        )
        .with_policy(self.dispatch_policy()?)
        .with_send_timeout(self.send_timeout()?))
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}
