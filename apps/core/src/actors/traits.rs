use crate::actors::messages::{AppError, Completion, CompletionRequest, StructuredRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Defines the public interface for a text-generation provider.
///
/// This trait abstracts the backend (remote API, local server, test double) so the pipeline can
/// be driven by any of them interchangeably.
#[async_trait]
pub trait GenerationProvider: Send + Sync + 'static {
    /// Generates a reply from instructions, history and an optional tool menu.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AppError>;

    /// Generates a JSON object constrained to `request.schema`.
    async fn structured(&self, request: StructuredRequest) -> Result<Value, AppError>;
}

/// A bookable link minted for a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_link: String,
}

/// A checkout session created for a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// Urgency of a human handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

/// What the live operator receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub lead_phone: String,
    pub lead_name: Option<String>,
    pub reason: String,
    pub summary: String,
    pub urgency: Urgency,
    pub is_vip: bool,
}

/// Mints bookable links.
#[async_trait]
pub trait SchedulingService: Send + Sync + 'static {
    async fn booking_link(&self, email: &str, name: &str) -> Result<Booking, AppError>;
}

/// Creates checkout sessions. `idempotency_key` is stable across retries of the same tool call.
#[async_trait]
pub trait PaymentService: Send + Sync + 'static {
    async fn create_checkout(
        &self,
        email: &str,
        phone: &str,
        plan: &str,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, AppError>;
}

/// Delivers a message to the end user.
#[async_trait]
pub trait NotificationService: Send + Sync + 'static {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), AppError>;
}

/// Notifies a live operator.
#[async_trait]
pub trait HandoffService: Send + Sync + 'static {
    async fn notify_operator(&self, request: HandoffRequest) -> Result<(), AppError>;
}
