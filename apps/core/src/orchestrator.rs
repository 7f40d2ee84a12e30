//! Orchestrator - runs one conversational turn end to end.
//!
//! gate -> signals (and strategy, concurrently) -> examples -> instructions -> generation with
//! tools -> tool dispatch -> follow-up generation -> cleaned reply.
//!
//! `run` never fails: every error class ends in a valid [`PipelineResult`].

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::actors::messages::{ChatMessage, Completion, CompletionRequest, ToolCall};
use crate::actors::provider::{ProviderHandle, ProviderSettings};
use crate::actors::tools::{Collaborators, DispatchReport, ToolDispatcher};
use crate::actors::traits::GenerationProvider;
use crate::actors::webhooks::{WebhookCollaborators, WebhookEndpoints};
use crate::brain::analyzer::SignalAnalyzer;
use crate::brain::context_packet::ContextPacket;
use crate::brain::fast_path::FastPathPolicy;
use crate::brain::few_shot::{render_examples, select_examples, ExampleLibrary, DEFAULT_MAX_EXAMPLES};
use crate::brain::industry::Industry;
use crate::brain::objection::ObjectionKind;
use crate::brain::prompt::{compose, tone_section, PromptSections};
use crate::brain::sentiment::{Sentiment, HISTORY_LOOKBACK};
use crate::brain::state::{transition, DialogueState, TurnSignal};
use crate::brain::strategy::{extract_asked_questions, StrategyAnalyzer, StrategyAssessment};
use crate::config::{PipelineConfig, DEFAULT_HISTORY_WINDOW};
use crate::models::{ConversationContext, Message, PipelineResult, Role, TenantConfig};

/// Returned whenever no usable reply could be generated.
pub const FALLBACK_REPLY: &str =
    "Perdona, tuve un problema para procesar tu mensaje. ¿Me lo puedes repetir?";

pub const DEFAULT_PERSONA: &str = "Eres Sofía, asesora de ventas de LeadFlow, un asistente que \
atiende por WhatsApp a los clientes de negocios pequeños las 24 horas. Eres cálida, directa y \
breve. Hablas como una persona, nunca como un robot, y jamás inventas precios ni datos.";

/// Role labels a model sometimes leaks at the start of a reply.
const ROLE_PREFIXES: &[&str] = &["asistente:", "assistant:", "bot:", "ai:", "ia:"];

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub persona: String,
    pub max_examples: usize,
    /// Messages of history sent with the reply request.
    pub history_window: usize,
    pub temperature: Option<f32>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            max_examples: DEFAULT_MAX_EXAMPLES,
            history_window: DEFAULT_HISTORY_WINDOW,
            temperature: Some(0.7),
        }
    }
}

/// Entry point of the pipeline. Holds only immutable tables and shared handles, so one instance
/// serves concurrent turns of different conversations.
pub struct Orchestrator {
    provider: Arc<dyn GenerationProvider>,
    strategy: StrategyAnalyzer,
    signals: SignalAnalyzer,
    fast_path: FastPathPolicy,
    dispatcher: ToolDispatcher,
    library: ExampleLibrary,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn GenerationProvider>, collaborators: Collaborators) -> Self {
        Self {
            strategy: StrategyAnalyzer::new(provider.clone()),
            provider,
            signals: SignalAnalyzer::new(),
            fast_path: FastPathPolicy::new(),
            dispatcher: ToolDispatcher::new(collaborators),
            library: ExampleLibrary::builtin(),
            settings: OrchestratorSettings::default(),
        }
    }

    /// HTTP provider and webhook collaborators built from configuration.
    ///
    /// Spawns the provider actor, so it must be called inside a Tokio runtime.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let provider: Arc<dyn GenerationProvider> =
            Arc::new(ProviderHandle::new(ProviderSettings::from_config(config)));
        let hooks = Arc::new(WebhookCollaborators::new(
            WebhookEndpoints::from_config(config),
            config.request_timeout(),
        ));

        Self::new(provider, Collaborators::shared(hooks)).with_settings(OrchestratorSettings {
            max_examples: config.max_examples,
            history_window: config.history_window,
            temperature: Some(config.temperature),
            ..Default::default()
        })
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_library(mut self, library: ExampleLibrary) -> Self {
        self.library = library;
        self
    }

    #[instrument(
        name = "pipeline_turn",
        skip_all,
        fields(turn_id = %Uuid::new_v4(), history_len = context.recent_messages.len())
    )]
    pub async fn run(
        &self,
        message: &str,
        context: &ConversationContext,
        tenant: Option<&TenantConfig>,
    ) -> PipelineResult {
        let tenant = sanitize_tenant(tenant);
        let history = &context.recent_messages;
        let recent_user = context.recent_user_texts(HISTORY_LOOKBACK);
        let industry_hint = context.lead.industry.as_deref();

        // --- Gate & Analysis ---
        let decision = self.fast_path.evaluate(message, history.len());
        let (packet, assessment) = if decision.is_simple() {
            (self.signals.analyze(message, &recent_user, industry_hint), None)
        } else {
            let signals = async { self.signals.analyze(message, &recent_user, industry_hint) };
            let strategy = self.strategy.analyze(message, history, &context.lead);
            let (packet, strategy) = tokio::join!(signals, strategy);
            let assessment = match strategy {
                Ok(assessment) => Some(assessment),
                Err(e) => {
                    warn!(
                        deficiency = "strategy_analysis_failed",
                        error = %e,
                        "Strategy analysis failed, continuing without it"
                    );
                    None
                }
            };
            (packet, assessment)
        };
        info!(fast_path = ?decision, strategy = assessment.is_some(), "{}", packet.summary());

        let objection = effective_objection(&packet, assessment.as_ref());
        let detected_domain = packet.detected_domain();
        let deferral_flag = objection == ObjectionKind::Timing;

        // --- Instructions ---
        let instructions = self.compose_instructions(message, context, &tenant, &packet, assessment.as_ref(), objection);

        // --- Generation ---
        let mut messages: Vec<ChatMessage> = window(history, self.settings.history_window)
            .iter()
            .map(to_chat_message)
            .collect();
        messages.push(ChatMessage::user(message));
        let tools = self.dispatcher.menu(context.has_active_appointment, &tenant.mock_tools);

        let request = CompletionRequest {
            system: instructions.clone(),
            messages: messages.clone(),
            tools: tools.clone(),
            temperature: self.settings.temperature,
        };
        let first = match self.provider.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!(error = %e, "Generation failed, returning fallback reply");
                return PipelineResult {
                    reply: FALLBACK_REPLY.to_string(),
                    detected_domain,
                    deferral_flag,
                    ..Default::default()
                };
            }
        };

        // --- Tools ---
        let mut tokens_used = first.tokens_used;
        let mut report = DispatchReport::default();
        let raw_reply = if first.tool_calls.is_empty() {
            first.content
        } else {
            report = self
                .dispatcher
                .dispatch(&first.tool_calls, &context.lead, &tenant.mock_tools, &tools)
                .await;
            let (follow_up, follow_up_tokens) = self
                .follow_up(instructions, messages, &first, &report)
                .await;
            tokens_used = add_tokens(tokens_used, follow_up_tokens);
            follow_up.or(first.content)
        };

        let reply = raw_reply
            .map(|raw| clean_reply(&raw))
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| {
                warn!("Provider returned no usable text, using fallback reply");
                FALLBACK_REPLY.to_string()
            });

        PipelineResult {
            reply,
            tokens_used,
            escalation: report.escalation,
            payment_link_sent: report.payment_link,
            detected_domain,
            deferral_flag,
        }
    }

    fn compose_instructions(
        &self,
        message: &str,
        context: &ConversationContext,
        tenant: &TenantConfig,
        packet: &ContextPacket,
        assessment: Option<&StrategyAssessment>,
        objection: ObjectionKind,
    ) -> String {
        let history = &context.recent_messages;

        let library = match tenant.examples.as_deref() {
            Some(records) if !records.is_empty() => records,
            _ => self.library.records(),
        };
        let selected = select_examples(&packet.tags, library, self.settings.max_examples);
        debug!(
            tags = ?packet.tags,
            examples = ?selected.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            "Examples selected"
        );

        let state = DialogueState::derive(context.lead.stage, context.has_active_appointment, history.len());
        let signal = TurnSignal::derive(packet.intent.label, objection);
        let directive = transition(state, signal).with_appointment(context.has_active_appointment);
        debug!(?state, ?signal, ?directive, message_len = message.len(), "Directive chosen");

        let domain = (packet.industry.label != Industry::General).then(|| {
            format!(
                "El prospecto tiene un negocio de {}. {}",
                packet.industry.label.display_name(),
                packet.industry.guidance
            )
        });

        let memory = context
            .memory
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| format!("{}\n{}", context.lead.describe(), m));

        let strategy = match assessment {
            Some(assessment) => Some(assessment.prompt_section()),
            None => asked_questions_section(history),
        };

        let sentiment_guidance = match packet.sentiment.label {
            Sentiment::Neutral => "",
            _ => packet.sentiment.guidance.as_str(),
        };
        let objection_guidance = if packet.objection.label == objection {
            packet.objection.guidance.as_str()
        } else {
            self.signals.objection_detector().guidance_for(objection)
        };
        let tone = tone_section(
            packet.sentiment.label.label(),
            sentiment_guidance,
            objection.is_some().then(|| objection.display_name()),
            objection_guidance,
        );

        compose(&PromptSections {
            persona: tenant
                .persona
                .clone()
                .unwrap_or_else(|| self.settings.persona.clone()),
            domain,
            memory,
            knowledge: tenant.knowledge.clone(),
            examples: Some(render_examples(&selected)),
            strategy,
            tone,
            state_directive: directive.instruction(),
        })
    }

    /// Second call without tools so the provider can phrase the reply around the tool results.
    async fn follow_up(
        &self,
        instructions: String,
        mut messages: Vec<ChatMessage>,
        first: &Completion,
        report: &DispatchReport,
    ) -> (Option<String>, Option<u32>) {
        let mut echoed: HashSet<&str> = HashSet::new();
        let calls: Vec<ToolCall> = first
            .tool_calls
            .iter()
            .filter(|call| echoed.insert(call.id.as_str()))
            .cloned()
            .collect();
        messages.push(ChatMessage::assistant_tool_calls(first.content.clone(), calls));
        for executed in &report.executed {
            messages.push(ChatMessage::tool_result(&executed.call_id, executed.result.content()));
        }

        let request = CompletionRequest {
            system: instructions,
            messages,
            tools: Vec::new(),
            temperature: self.settings.temperature,
        };
        match self.provider.complete(request).await {
            Ok(completion) => (completion.content, completion.tokens_used),
            Err(e) => {
                warn!(error = %e, "Follow-up generation failed, keeping the first response");
                (None, None)
            }
        }
    }
}

/// The detector's objection, or the analyzer's when the detector saw none.
fn effective_objection(packet: &ContextPacket, assessment: Option<&StrategyAssessment>) -> ObjectionKind {
    if packet.objection.label.is_some() {
        return packet.objection.label;
    }
    assessment
        .and_then(|a| a.objection)
        .unwrap_or(ObjectionKind::None)
}

fn asked_questions_section(history: &[Message]) -> Option<String> {
    let asked = extract_asked_questions(history);
    if asked.is_empty() {
        return None;
    }
    let mut lines = vec!["YA PREGUNTADO (no repetir estas preguntas):".to_string()];
    lines.extend(asked.iter().map(|q| format!("- {}", q)));
    Some(lines.join("\n"))
}

fn sanitize_tenant(tenant: Option<&TenantConfig>) -> TenantConfig {
    let Some(tenant) = tenant else {
        return TenantConfig::default();
    };

    let mut clean = tenant.clone();
    clean.persona = clean.persona.filter(|p| !p.trim().is_empty());
    clean.knowledge = clean.knowledge.filter(|k| !k.trim().is_empty());

    let mut names = HashSet::new();
    clean.mock_tools.retain(|spec| {
        if let Err(e) = spec.validate() {
            warn!(tool = %spec.name, error = %e, "Ignoring invalid mock tool");
            return false;
        }
        names.insert(spec.name.clone())
    });
    clean
}

fn window(history: &[Message], size: usize) -> &[Message] {
    &history[history.len().saturating_sub(size)..]
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        Role::User => ChatMessage::user(message.content.clone()),
        Role::Assistant => ChatMessage::assistant(message.content.clone()),
    }
}

fn add_tokens(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
    }
}

/// Strip formatting markers and a leaked role label.
pub fn clean_reply(raw: &str) -> String {
    let text = raw.replace("**", "").replace("__", "").replace('`', "");
    let mut text = text
        .lines()
        .map(|line| line.trim_start_matches('#').trim_start())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    while let Some(prefix) = ROLE_PREFIXES
        .iter()
        .find(|p| text.get(..p.len()).is_some_and(|head| head.eq_ignore_ascii_case(p)))
    {
        text = text[prefix.len()..].trim_start().to_string();
    }
    text
}
