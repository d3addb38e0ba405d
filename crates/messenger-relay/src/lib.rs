//! Webhook endpoint and settings plumbing around `messenger-relay-core`.

pub mod requirements;
pub mod server;
pub mod values;
