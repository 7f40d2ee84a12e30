use crate::actors::messages::{
    ActorError, AppError, ChatMessage, Completion, CompletionRequest, ProviderMessage,
    StructuredRequest,
};
use crate::actors::traits::GenerationProvider;
use crate::config::PipelineConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Connection settings for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub reasoning_model: String,
    pub request_timeout: Duration,
}

impl ProviderSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            base_url: config.provider_base_url.clone(),
            api_key: config.provider_api_key.clone(),
            chat_model: config.chat_model.clone(),
            reasoning_model: config.reasoning_model.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    /// `<base>/chat/completions`, keeping any path prefix such as `/v1`.
    fn completions_url(&self) -> Result<Url, AppError> {
        let mut base = Url::parse(&self.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join("chat/completions")?)
    }
}

/// A handle to the provider actor.
///
/// This struct provides a public, cloneable interface for sending messages to the
/// running provider actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct ProviderHandle {
    sender: mpsc::Sender<ProviderMessage>,
    reply_timeout: Duration,
}

impl ProviderHandle {
    /// Creates a new provider actor and returns a handle to it.
    ///
    /// This will spawn the `ProviderRunner` in a new Tokio task.
    pub fn new(settings: ProviderSettings) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        // The handle waits a little longer than the HTTP call so the runner reports the timeout.
        let reply_timeout = settings.request_timeout + Duration::from_secs(5);
        let actor = ProviderRunner::new(receiver, settings);
        tokio::spawn(async move { actor.run().await });
        Self {
            sender,
            reply_timeout,
        }
    }

    async fn request<T>(
        &self,
        msg: ProviderMessage,
        recv: oneshot::Receiver<Result<T, AppError>>,
    ) -> Result<T, AppError> {
        self.sender
            .send(msg)
            .await
            .map_err(|e| AppError::Actor(ActorError::MailboxClosed(e.to_string())))?;
        timeout(self.reply_timeout, recv)
            .await?
            .map_err(|e| AppError::Actor(ActorError::NoResponse(e.to_string())))?
    }
}

#[async_trait]
impl GenerationProvider for ProviderHandle {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = ProviderMessage::Complete {
            request,
            responder: send,
        };
        self.request(msg, recv).await
    }

    async fn structured(&self, request: StructuredRequest) -> Result<Value, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = ProviderMessage::Structured {
            request,
            responder: send,
        };
        self.request(msg, recv).await
    }
}

// --- Wire types ---
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

// --- Actor Runner (Internal Logic) ---

/// Upper bound on provider calls in flight at once.
const MAX_IN_FLIGHT: usize = 16;

struct ProviderRunner {
    receiver: mpsc::Receiver<ProviderMessage>,
    worker: Arc<ProviderWorker>,
    permits: Arc<Semaphore>,
}

impl ProviderRunner {
    fn new(receiver: mpsc::Receiver<ProviderMessage>, settings: ProviderSettings) -> Self {
        Self {
            receiver,
            worker: Arc::new(ProviderWorker {
                client: Client::new(),
                settings,
            }),
            permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    async fn run(mut self) {
        info!(model = %self.worker.settings.chat_model, "Provider actor started");

        while let Some(msg) = self.receiver.recv().await {
            // Each call runs on its own task so one slow completion does not hold up the mailbox.
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            let worker = self.worker.clone();
            tokio::spawn(async move {
                worker.handle_message(msg).await;
                drop(permit);
            });
        }

        info!("Provider actor stopped");
    }
}

/// Shared HTTP state behind every in-flight provider call.
struct ProviderWorker {
    client: Client,
    settings: ProviderSettings,
}

impl ProviderWorker {
    async fn handle_message(&self, msg: ProviderMessage) {
        match msg {
            ProviderMessage::Complete { request, responder } => {
                let result = self.complete(request).await;
                let _ = responder.send(result);
            }
            ProviderMessage::Structured { request, responder } => {
                let result = self.structured(request).await;
                let _ = responder.send(result);
            }
        }
    }

    async fn post(&self, payload: &Value) -> Result<ChatCompletionResponse, AppError> {
        let mut builder = self
            .client
            .post(self.settings.completions_url()?)
            .json(payload);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = timeout(self.settings.request_timeout, builder.send()).await??;
        let status = res.status();

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(%status, "Provider request failed");
            return Err(AppError::Provider(format!(
                "Completion request failed with status {}: {}",
                status, body
            )));
        }

        res.json::<ChatCompletionResponse>()
            .await
            .map_err(|e| AppError::Provider(format!("Malformed completion response: {}", e)))
    }

    #[instrument(name = "provider_complete", skip_all, fields(messages = request.messages.len(), tools = request.tools.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AppError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(request.system));
        messages.extend(request.messages);

        let mut payload = json!({
            "model": self.settings.chat_model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            payload["tools"] = serde_json::to_value(&request.tools)?;
            payload["tool_choice"] = json!("auto");
        }
        if let Some(temp) = request.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(&payload).await?;
        let tokens_used = response.usage.map(|u| u.total_tokens);
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AppError::Provider("Completion response has no choices".to_string()))?;

        debug!(
            tool_calls = message.tool_calls.len(),
            tokens_used,
            "Completion received"
        );
        Ok(Completion {
            content: message.content.filter(|c| !c.trim().is_empty()),
            tool_calls: message.tool_calls,
            tokens_used,
        })
    }

    #[instrument(name = "provider_structured", skip_all, fields(schema = %request.schema_name))]
    async fn structured(&self, request: StructuredRequest) -> Result<Value, AppError> {
        let mut payload = json!({
            "model": self.settings.reasoning_model,
            "messages": [ChatMessage::user(request.prompt)],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.schema,
                }
            }
        });
        if let Some(temp) = request.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(&payload).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Schema("Structured response has no content".to_string()))?;

        let value: Value = serde_json::from_str(content.trim())
            .map_err(|e| AppError::Schema(format!("Structured response is not JSON: {}", e)))?;
        if !value.is_object() {
            return Err(AppError::Schema("Structured response is not an object".to_string()));
        }
        Ok(value)
    }
}
