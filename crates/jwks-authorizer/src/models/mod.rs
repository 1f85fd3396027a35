//! Request descriptor, decision, and the gateway policy document.
//!
//! The policy document layout (field names, the `2012-10-17` policy language
//! version and the `execute-api:Invoke` action) is consumed by the API gateway
//! and must not change.

use serde::{Deserialize, Serialize};

/// Policy language version expected by the gateway.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action granted or denied by the policy statement.
pub const POLICY_ACTION: &str = "execute-api:Invoke";

/// Inbound authorization request from the gateway.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    /// Resource being guarded.
    #[serde(default)]
    pub method_arn: String,

    /// Raw `Authorization` header value, e.g. `Bearer eyJ...`.
    #[serde(default)]
    pub authorization_token: Option<String>,

    /// Authorizer type reported by the gateway (`TOKEN`), informational.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
}

/// Outcome of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// Authorization decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub principal: String,
    pub effect: Effect,
    pub resource: String,
    pub message: String,
}

impl Decision {
    pub fn allow(principal: &str, resource: &str, message: &str) -> Self {
        Self {
            principal: principal.to_string(),
            effect: Effect::Allow,
            resource: resource.to_string(),
            message: message.to_string(),
        }
    }

    pub fn deny(principal: &str, resource: &str, message: String) -> Self {
        Self {
            principal: principal.to_string(),
            effect: Effect::Deny,
            resource: resource.to_string(),
            message,
        }
    }

    /// Render the decision as the gateway policy document.
    pub fn into_policy(self, usage_identifier_key: &str) -> PolicyResponse {
        PolicyResponse {
            principal_id: self.principal,
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![PolicyStatement {
                    action: POLICY_ACTION.to_string(),
                    effect: self.effect,
                    resource: self.resource,
                }],
            },
            context: PolicyContext {
                message: self.message,
            },
            usage_identifier_key: usage_identifier_key.to_string(),
        }
    }
}

/// Policy document returned to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    pub context: PolicyContext,
    pub usage_identifier_key: String,
}

impl PolicyResponse {
    /// Effect of the (single) statement.
    pub fn effect(&self) -> Option<Effect> {
        self.policy_document.statement.first().map(|s| s.effect)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyStatement {
    #[serde(rename = "Action")]
    pub action: String,

    #[serde(rename = "Effect")]
    pub effect: Effect,

    #[serde(rename = "Resource")]
    pub resource: String,
}

/// Extra values passed through to the gateway's request context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyContext {
    pub message: String,
}

/// Readiness probe response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: String,

    /// Keys in the cached key set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_count: Option<usize>,

    /// RFC 3339 time of the last successful key set fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,

    /// Seconds since the last successful key set fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,

    /// Whether the cached key set is past its TTL and due for refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
}
