//! Collaborators backed by JSON webhooks.
//!
//! Each capability posts to its own endpoint. An endpoint that is not configured fails the tool
//! call with a `Config` error instead of failing the turn.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::actors::messages::AppError;
use crate::actors::traits::{
    Booking, CheckoutSession, HandoffRequest, HandoffService, NotificationService,
    PaymentService, SchedulingService,
};
use crate::config::PipelineConfig;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Endpoint per capability.
#[derive(Debug, Clone, Default)]
pub struct WebhookEndpoints {
    pub scheduling: Option<String>,
    pub payment: Option<String>,
    pub notification: Option<String>,
    pub handoff: Option<String>,
    pub token: Option<String>,
}

impl WebhookEndpoints {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            scheduling: config.scheduling_url.clone(),
            payment: config.payment_url.clone(),
            notification: config.notification_url.clone(),
            handoff: config.handoff_url.clone(),
            token: config.webhook_token.clone(),
        }
    }
}

/// Scheduling, payment, notification and handoff over HTTP.
#[derive(Clone)]
pub struct WebhookCollaborators {
    client: Client,
    endpoints: WebhookEndpoints,
    request_timeout: Duration,
}

impl WebhookCollaborators {
    pub fn new(endpoints: WebhookEndpoints, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            request_timeout,
        }
    }

    /// POST `body` and check the status. The response body is left unread.
    async fn send<B>(
        &self,
        capability: &str,
        endpoint: Option<&str>,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<Response, AppError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let endpoint = endpoint.ok_or_else(|| {
            AppError::Config(format!("No endpoint configured for {}", capability))
        })?;

        let mut builder = self
            .client
            .post(endpoint)
            .timeout(self.request_timeout)
            .json(body);
        if let Some(token) = &self.endpoints.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| AppError::Tool(format!("{} request failed: {}", capability, e)))?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(capability, %status, "Webhook rejected the request");
            return Err(AppError::Tool(format!(
                "{} returned status {}: {}",
                capability, status, text
            )));
        }
        Ok(res)
    }

    /// POST and decode a JSON response body.
    async fn post<B, R>(
        &self,
        capability: &str,
        endpoint: Option<&str>,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<R, AppError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.send(capability, endpoint, body, idempotency_key)
            .await?
            .json::<R>()
            .await
            .map_err(|e| AppError::Tool(format!("{} returned an invalid body: {}", capability, e)))
    }
}

#[async_trait]
impl SchedulingService for WebhookCollaborators {
    async fn booking_link(&self, email: &str, name: &str) -> Result<Booking, AppError> {
        self.post(
            "scheduling",
            self.endpoints.scheduling.as_deref(),
            &json!({ "email": email, "name": name }),
            None,
        )
        .await
    }
}

#[async_trait]
impl PaymentService for WebhookCollaborators {
    async fn create_checkout(
        &self,
        email: &str,
        phone: &str,
        plan: &str,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, AppError> {
        let session: CheckoutSession = self
            .post(
                "payment",
                self.endpoints.payment.as_deref(),
                &json!({ "email": email, "phone": phone, "plan": plan }),
                Some(idempotency_key),
            )
            .await?;
        info!(session_id = %session.session_id, plan, "Checkout session created");
        Ok(session)
    }
}

#[async_trait]
impl NotificationService for WebhookCollaborators {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), AppError> {
        self.send(
            "notification",
            self.endpoints.notification.as_deref(),
            &json!({ "phone": phone, "text": text }),
            None,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl HandoffService for WebhookCollaborators {
    async fn notify_operator(&self, request: HandoffRequest) -> Result<(), AppError> {
        self.send("handoff", self.endpoints.handoff.as_deref(), &request, None)
            .await?;
        info!(urgency = ?request.urgency, vip = request.is_vip, "Operator notified");
        Ok(())
    }
}
