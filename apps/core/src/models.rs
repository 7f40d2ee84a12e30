use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::actors::tools::BUILTIN_TOOL_NAMES;
use crate::brain::few_shot::ExampleRecord;

/// The author of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message within a conversation. Stored messages are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,
    /// The text content of the message.
    pub content: String,
    /// When the message was received or sent.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Where the lead currently sits in the sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    #[default]
    New,
    Contacted,
    Qualified,
    DemoScheduled,
    Customer,
    Lost,
}

/// Identity of the prospective customer attached to a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub name: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Industry, when the caller already knows it.
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub stage: LifecycleStage,
}

impl Lead {
    /// One-line description of the lead used inside prompts.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!(
            "Nombre: {}",
            self.name.as_deref().unwrap_or("desconocido")
        ));
        if let Some(company) = &self.company {
            parts.push(format!("Empresa: {}", company));
        }
        if let Some(industry) = &self.industry {
            parts.push(format!("Giro: {}", industry));
        }
        parts.push(format!("Etapa: {:?}", self.stage));
        parts.join(" | ")
    }
}

/// Aggregate handed to the pipeline for one inbound message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub lead: Lead,
    /// Ordered oldest-first, most recent last.
    #[serde(default)]
    pub recent_messages: Vec<Message>,
    /// Free-text summary of prior sessions.
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub has_active_appointment: bool,
}

impl ConversationContext {
    pub fn new(lead: Lead) -> Self {
        Self {
            lead,
            ..Default::default()
        }
    }

    /// The last `limit` user messages, oldest first.
    pub fn recent_user_texts(&self, limit: usize) -> Vec<&str> {
        let mut texts: Vec<&str> = self
            .recent_messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::User)
            .take(limit)
            .map(|m| m.content.as_str())
            .collect();
        texts.reverse();
        texts
    }
}

/// A caller-declared tool that returns a fixed result without side effects.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MockToolSpec {
    #[validate(custom(function = "validate_mock_tool_name"))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    /// Returned verbatim to the generation step when the tool is called.
    pub result: serde_json::Value,
}

fn validate_mock_tool_name(name: &str) -> Result<(), ValidationError> {
    let well_formed = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !well_formed {
        return Err(ValidationError::new("tool_name_format"));
    }
    if BUILTIN_TOOL_NAMES.contains(&name) {
        return Err(ValidationError::new("tool_name_shadows_builtin"));
    }
    Ok(())
}

/// Optional per-tenant inputs. Purely additive or substitutive: nothing here changes how
/// detectors score or how examples are ranked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TenantConfig {
    #[validate(length(min = 1))]
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub examples: Option<Vec<ExampleRecord>>,
    #[serde(default)]
    pub knowledge: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub mock_tools: Vec<MockToolSpec>,
}

/// A completed handoff to a human operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub reason: String,
    pub summary: String,
}

/// A checkout link that was created and delivered to the lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLinkRecord {
    pub plan: String,
    pub email: String,
    pub url: String,
}

/// The only object returned to the caller for a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub reply: String,
    pub tokens_used: Option<u32>,
    pub escalation: Option<EscalationRecord>,
    pub payment_link_sent: Option<PaymentLinkRecord>,
    pub detected_domain: Option<String>,
    /// The lead postponed the decision; the caller should schedule a follow-up.
    pub deferral_flag: bool,
}
