//! Shared test doubles for the scenario suites.

use crate::actors::messages::{AppError, Completion, CompletionRequest, StructuredRequest, ToolCall};
use crate::actors::tools::Collaborators;
use crate::actors::traits::{
    Booking, CheckoutSession, GenerationProvider, HandoffRequest, HandoffService,
    NotificationService, PaymentService, SchedulingService,
};
use crate::models::{ConversationContext, Lead, Message};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DEFAULT_REPLY: &str = "Claro, con gusto te ayudo.";

// --- Mock Provider ---

/// Replays scripted completions in order, then answers with [`DEFAULT_REPLY`].
pub struct ScriptedProvider {
    completions: Mutex<VecDeque<Result<Completion, AppError>>>,
    structured_response: Option<Result<Value, AppError>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub structured_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(completions: Vec<Result<Completion, AppError>>) -> Self {
        Self {
            completions: Mutex::new(completions.into()),
            structured_response: None,
            requests: Mutex::new(Vec::new()),
            structured_calls: AtomicUsize::new(0),
        }
    }

    /// Every structured call returns `response`.
    pub fn with_structured(mut self, response: Result<Value, AppError>) -> Self {
        self.structured_response = Some(response);
        self
    }

    pub fn structured_count(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AppError> {
        self.requests.lock().unwrap().push(request);
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text(DEFAULT_REPLY)))
    }

    async fn structured(&self, _request: StructuredRequest) -> Result<Value, AppError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        self.structured_response
            .clone()
            .unwrap_or_else(|| Err(AppError::Provider("no structured response scripted".to_string())))
    }
}

pub fn text(content: &str) -> Completion {
    Completion {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
        tokens_used: Some(50),
    }
}

pub fn tool_calls(calls: Vec<ToolCall>) -> Completion {
    Completion {
        content: None,
        tool_calls: calls,
        tokens_used: Some(30),
    }
}

// --- Mock Collaborators ---

/// Records every side effect. Checkout sessions are keyed by idempotency key, like a real
/// payment processor.
#[derive(Default)]
pub struct RecordingCollaborators {
    pub sessions: Mutex<HashMap<String, CheckoutSession>>,
    pub checkout_calls: AtomicUsize,
    pub idempotency_keys: Mutex<Vec<String>>,
    pub texts: Mutex<Vec<(String, String)>>,
    pub handoffs: Mutex<Vec<HandoffRequest>>,
    pub bookings: Mutex<Vec<(String, String)>>,
    pub fail_notifications: bool,
    pub fail_handoff: bool,
}

impl RecordingCollaborators {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn text_count(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn handoff_count(&self) -> usize {
        self.handoffs.lock().unwrap().len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.lock().unwrap().len()
    }
}

#[async_trait]
impl SchedulingService for RecordingCollaborators {
    async fn booking_link(&self, email: &str, name: &str) -> Result<Booking, AppError> {
        self.bookings
            .lock()
            .unwrap()
            .push((email.to_string(), name.to_string()));
        Ok(Booking {
            booking_link: format!("https://cal.example.com/demo?email={}", email),
        })
    }
}

#[async_trait]
impl PaymentService for RecordingCollaborators {
    async fn create_checkout(
        &self,
        _email: &str,
        _phone: &str,
        plan: &str,
        idempotency_key: &str,
    ) -> Result<CheckoutSession, AppError> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        self.idempotency_keys
            .lock()
            .unwrap()
            .push(idempotency_key.to_string());

        let mut sessions = self.sessions.lock().unwrap();
        let next = sessions.len() + 1;
        let session = sessions
            .entry(idempotency_key.to_string())
            .or_insert_with(|| CheckoutSession {
                session_id: format!("cs_{}", next),
                checkout_url: format!("https://pay.example.com/{}/cs_{}", plan, next),
            });
        Ok(session.clone())
    }
}

#[async_trait]
impl NotificationService for RecordingCollaborators {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), AppError> {
        if self.fail_notifications {
            return Err(AppError::Tool("notification gateway down".to_string()));
        }
        self.texts
            .lock()
            .unwrap()
            .push((phone.to_string(), text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl HandoffService for RecordingCollaborators {
    async fn notify_operator(&self, request: HandoffRequest) -> Result<(), AppError> {
        if self.fail_handoff {
            return Err(AppError::Tool("operator queue unavailable".to_string()));
        }
        self.handoffs.lock().unwrap().push(request);
        Ok(())
    }
}

pub fn collaborators(recorder: &Arc<RecordingCollaborators>) -> Collaborators {
    Collaborators::shared(recorder.clone())
}

// --- Fixtures ---

pub fn lead() -> Lead {
    Lead {
        name: Some("Ana".to_string()),
        phone: "+5215550001111".to_string(),
        ..Default::default()
    }
}

pub fn context(history: Vec<Message>) -> ConversationContext {
    let mut ctx = ConversationContext::new(lead());
    ctx.recent_messages = history;
    ctx
}
