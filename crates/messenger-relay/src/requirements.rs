use serde::Serialize;

use crate::values::{
    ACCESS_TOKEN, API_BASE_URL, APP_SECRET, CONFIG_ENV, IMAGE_MODE, IMAGE_PLACEHOLDER_URL,
    REPLY_MODE, REPLY_PREFIX, REPLY_TEXT, SEND_TIMEOUT_MS, VERIFY_TOKEN, Values,
};

#[derive(Debug, Serialize)]
pub struct Requirements {
    pub config: RequirementGroup,
    pub secrets: RequirementGroup,
}

#[derive(Debug, Serialize, Default)]
pub struct RequirementGroup {
    pub required: Vec<FieldRequirement>,
    pub optional: Vec<FieldRequirement>,
}

#[derive(Debug, Serialize)]
pub struct FieldRequirement {
    pub key: &'static str,
    pub env: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub missing_config: Vec<String>,
    pub missing_secrets: Vec<String>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.missing_config.is_empty() && self.missing_secrets.is_empty()
    }
}

fn config_field(key: &'static str, description: &'static str) -> FieldRequirement {
    let env = CONFIG_ENV
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, env)| *env)
        .unwrap_or(key);
    FieldRequirement {
        key,
        env,
        description,
    }
}

fn secret_field(key: &'static str, description: &'static str) -> FieldRequirement {
    FieldRequirement {
        key,
        env: key,
        description,
    }
}

impl Requirements {
    pub fn relay() -> Self {
        Self {
            config: RequirementGroup {
                required: vec![config_field(API_BASE_URL, "base URL of the send API")],
                optional: vec![
                    config_field(REPLY_MODE, "prefix, echo or fixed"),
                    config_field(REPLY_PREFIX, "text placed before the echoed message"),
                    config_field(REPLY_TEXT, "reply used by the fixed mode"),
                    config_field(IMAGE_MODE, "placeholder or inbound"),
                    config_field(IMAGE_PLACEHOLDER_URL, "image sent back for inbound images"),
                    config_field(SEND_TIMEOUT_MS, "deadline for the sends of one delivery"),
                ],
            },
            secrets: RequirementGroup {
                required: vec![
                    secret_field(ACCESS_TOKEN, "page access token for the send API"),
                    secret_field(VERIFY_TOKEN, "token expected in the subscription handshake"),
                    secret_field(APP_SECRET, "app secret signing inbound deliveries"),
                ],
                optional: Vec::new(),
            },
        }
    }

    pub fn validate(&self, values: &Values) -> ValidationReport {
        let mut report = ValidationReport::default();
        for field in &self.config.required {
            if values.config_str(field.key).is_none() {
                report.missing_config.push(field.env.to_string());
            }
        }
        for field in &self.secrets.required {
            if values.secret_str(field.key).is_none() {
                report.missing_secrets.push(field.env.to_string());
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn relay_requires_endpoint_and_secrets() {
        let req = Requirements::relay();
        assert_eq!(req.config.required.len(), 1);
        assert_eq!(req.config.required[0].env, "GRAPHQL_URL");
        assert_eq!(req.secrets.required.len(), 3);
    }

    #[test]
    fn validation_reports_missing_values() {
        let mut values = Values::default();
        values.config.insert(
            API_BASE_URL.to_string(),
            Value::String("https://graph.example.test".to_string()),
        );
        values
            .secrets
            .insert(ACCESS_TOKEN.to_string(), Value::String("token".to_string()));
        let report = Requirements::relay().validate(&values);
        assert!(report.missing_config.is_empty());
        assert_eq!(
            report.missing_secrets,
            vec!["VERIFY_TOKEN".to_string(), "FACEBOOK_APP_SECRET".to_string()]
        );
        assert!(!report.is_empty());
    }

    #[test]
    fn complete_values_pass() {
        let values = Values::from_lookup(|name| match name {
            "GRAPHQL_URL" => Some("https://graph.example.test".into()),
            "ACCESS_TOKEN" | "VERIFY_TOKEN" | "FACEBOOK_APP_SECRET" => Some("x".into()),
            _ => None,
        });
        assert!(Requirements::relay().validate(&values).is_empty());
    }
}
