//! Strategy analyzer.
//!
//! A second, schema-constrained provider call that re-reads the whole conversation and returns
//! where the sale stands, what is already known, and the single next question to ask. The result
//! is post-checked so that a known fact or an already-asked question is never proposed again.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::lexicon::{normalize_phrase, NormalizedText};
use super::objection::ObjectionKind;
use crate::actors::messages::StructuredRequest;
use crate::actors::traits::GenerationProvider;
use crate::error::AppError;
use crate::models::{Lead, Message, Role};

pub const SCHEMA_NAME: &str = "strategy_assessment";

/// Sentinel the provider must use instead of omitting a fact.
pub const UNKNOWN: &str = "unknown";

/// Sentinel for "no next question".
pub const NO_QUESTION: &str = "none";

/// Token-set similarity above which two questions count as the same question.
const DUPLICATE_SIMILARITY: f32 = 0.6;

const STRATEGY_TEMPERATURE: f32 = 0.2;

/// Stage of the sales process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    FirstContact,
    Discovery,
    ObjectionHandling,
    Qualification,
    Pricing,
    Closing,
    FollowUp,
}

impl ConversationPhase {
    pub const ALL: [ConversationPhase; 7] = [
        ConversationPhase::FirstContact,
        ConversationPhase::Discovery,
        ConversationPhase::ObjectionHandling,
        ConversationPhase::Qualification,
        ConversationPhase::Pricing,
        ConversationPhase::Closing,
        ConversationPhase::FollowUp,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConversationPhase::FirstContact => "first_contact",
            ConversationPhase::Discovery => "discovery",
            ConversationPhase::ObjectionHandling => "objection_handling",
            ConversationPhase::Qualification => "qualification",
            ConversationPhase::Pricing => "pricing",
            ConversationPhase::Closing => "closing",
            ConversationPhase::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A fact slot: a value, or the explicit unknown sentinel. Never absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fact {
    Known(String),
    #[default]
    Unknown,
}

impl Fact {
    pub fn is_known(&self) -> bool {
        matches!(self, Fact::Known(_))
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            Fact::Known(value) => Some(value),
            Fact::Unknown => None,
        }
    }
}

impl From<String> for Fact {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" | UNKNOWN | "desconocido" | "n/a" => Fact::Unknown,
            _ => Fact::Known(trimmed.to_string()),
        }
    }
}

impl From<Fact> for String {
    fn from(fact: Fact) -> Self {
        match fact {
            Fact::Known(value) => value,
            Fact::Unknown => UNKNOWN.to_string(),
        }
    }
}

/// Fact fields the analyzer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactField {
    Name,
    BusinessType,
    BusinessSize,
    CurrentChannel,
    MainPain,
    Budget,
    DecisionMaker,
    Timeline,
    Email,
}

impl FactField {
    pub const ALL: [FactField; 9] = [
        FactField::Name,
        FactField::BusinessType,
        FactField::BusinessSize,
        FactField::CurrentChannel,
        FactField::MainPain,
        FactField::Budget,
        FactField::DecisionMaker,
        FactField::Timeline,
        FactField::Email,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FactField::Name => "name",
            FactField::BusinessType => "business_type",
            FactField::BusinessSize => "business_size",
            FactField::CurrentChannel => "current_channel",
            FactField::MainPain => "main_pain",
            FactField::Budget => "budget",
            FactField::DecisionMaker => "decision_maker",
            FactField::Timeline => "timeline",
            FactField::Email => "email",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            FactField::Name => "Nombre",
            FactField::BusinessType => "Tipo de negocio",
            FactField::BusinessSize => "Tamaño del negocio",
            FactField::CurrentChannel => "Cómo atiende hoy",
            FactField::MainPain => "Problema principal",
            FactField::Budget => "Presupuesto",
            FactField::DecisionMaker => "Quién decide",
            FactField::Timeline => "Plazo",
            FactField::Email => "Correo",
        }
    }

    /// Phrases that mark a question as asking for this field.
    fn question_cues(&self) -> &'static [&'static str] {
        match self {
            FactField::Name => &["tu nombre", "como te llamas", "con quien tengo el gusto"],
            FactField::BusinessType => &["tipo de negocio", "a que te dedicas", "a que se dedica", "giro", "que negocio"],
            FactField::BusinessSize => &["cuantos empleados", "cuantas sucursales", "que tan grande", "cuantos mensajes", "cuantos clientes"],
            FactField::CurrentChannel => &["como atiendes", "como contestas", "que herramienta", "que usas", "quien responde"],
            FactField::MainPain => &["principal problema", "mayor reto", "que te gustaria mejorar", "que se te complica"],
            FactField::Budget => &["presupuesto", "cuanto quieres invertir", "cuanto inviertes"],
            FactField::DecisionMaker => &["quien decide", "tomas la decision", "alguien mas decide"],
            FactField::Timeline => &["para cuando", "que tan pronto", "cuando te gustaria empezar", "cuando quieres empezar"],
            FactField::Email => &["correo", "email", "mail"],
        }
    }
}

/// Facts gathered so far. Every field is present; unknown ones carry the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KnownFacts {
    pub name: Fact,
    pub business_type: Fact,
    pub business_size: Fact,
    pub current_channel: Fact,
    pub main_pain: Fact,
    pub budget: Fact,
    pub decision_maker: Fact,
    pub timeline: Fact,
    pub email: Fact,
}

impl KnownFacts {
    pub fn get(&self, field: FactField) -> &Fact {
        match field {
            FactField::Name => &self.name,
            FactField::BusinessType => &self.business_type,
            FactField::BusinessSize => &self.business_size,
            FactField::CurrentChannel => &self.current_channel,
            FactField::MainPain => &self.main_pain,
            FactField::Budget => &self.budget,
            FactField::DecisionMaker => &self.decision_maker,
            FactField::Timeline => &self.timeline,
            FactField::Email => &self.email,
        }
    }

    pub fn known_fields(&self) -> Vec<FactField> {
        FactField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_known())
            .collect()
    }

    /// Known field a question is asking for again, if any.
    pub fn targeted_by(&self, question: &str) -> Option<FactField> {
        let text = NormalizedText::new(question);
        self.known_fields().into_iter().find(|field| {
            field
                .question_cues()
                .iter()
                .any(|cue| text.contains_phrase(&normalize_phrase(cue)))
        })
    }
}

/// Structured situation assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAssessment {
    pub phase: ConversationPhase,
    pub known_facts: KnownFacts,
    pub already_asked: Vec<String>,
    pub objection: Option<ObjectionKind>,
    pub next_question: Option<String>,
    pub directive: String,
}

impl StrategyAssessment {
    /// Prompt section body. The already-asked list is embedded verbatim.
    pub fn prompt_section(&self) -> String {
        let mut lines = vec![format!("Fase actual: {}", self.phase)];

        lines.push("Datos conocidos:".to_string());
        for field in FactField::ALL {
            let value = self.known_facts.get(field).as_known().unwrap_or("desconocido");
            lines.push(format!("- {}: {}", field.display_name(), value));
        }

        if !self.already_asked.is_empty() {
            lines.push("YA PREGUNTADO (no repetir estas preguntas):".to_string());
            for question in &self.already_asked {
                lines.push(format!("- {}", question));
            }
        }

        let known: Vec<&str> = self
            .known_facts
            .known_fields()
            .into_iter()
            .map(|f| f.display_name())
            .collect();
        if !known.is_empty() {
            lines.push(format!("No vuelvas a preguntar: {}.", known.join(", ")));
        }

        if let Some(kind) = self.objection {
            lines.push(format!("Objeción detectada: {}", kind.display_name()));
        }

        match &self.next_question {
            Some(question) => lines.push(format!("Siguiente pregunta (literal): {}", question)),
            None => lines.push("Siguiente pregunta: ninguna, no hagas preguntas nuevas.".to_string()),
        }

        lines.push(format!("Instrucción: {}", self.directive));
        lines.join("\n")
    }
}

/// Wire shape of the structured response.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    phase: ConversationPhase,
    known_facts: KnownFacts,
    already_asked: Vec<String>,
    objection: String,
    next_question: String,
    directive: String,
}

impl TryFrom<RawAssessment> for StrategyAssessment {
    type Error = AppError;

    fn try_from(raw: RawAssessment) -> Result<Self, Self::Error> {
        let objection = ObjectionKind::parse(&raw.objection).ok_or_else(|| {
            AppError::Schema(format!("Unknown objection category: {:?}", raw.objection))
        })?;

        let directive = raw.directive.trim().to_string();
        if directive.is_empty() {
            return Err(AppError::Schema("Empty directive".to_string()));
        }

        let next_question = match raw.next_question.trim() {
            "" => None,
            q if q.eq_ignore_ascii_case(NO_QUESTION) => None,
            q => Some(q.to_string()),
        };

        Ok(Self {
            phase: raw.phase,
            known_facts: raw.known_facts,
            already_asked: raw
                .already_asked
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
            objection: objection.is_some().then_some(objection),
            next_question,
            directive,
        })
    }
}

/// JSON schema sent with the structured request.
pub fn assessment_schema() -> Value {
    let fact_properties: serde_json::Map<String, Value> = FactField::ALL
        .iter()
        .map(|f| (f.key().to_string(), json!({ "type": "string" })))
        .collect();
    let fact_keys: Vec<&str> = FactField::ALL.iter().map(|f| f.key()).collect();
    let phases: Vec<&str> = ConversationPhase::ALL.iter().map(|p| p.label()).collect();

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["phase", "known_facts", "already_asked", "objection", "next_question", "directive"],
        "properties": {
            "phase": { "type": "string", "enum": phases },
            "known_facts": {
                "type": "object",
                "additionalProperties": false,
                "required": fact_keys,
                "properties": fact_properties
            },
            "already_asked": { "type": "array", "items": { "type": "string" } },
            "objection": {
                "type": "string",
                "enum": ["none", "price", "timing", "trust", "competitor", "authority", "no_need"]
            },
            "next_question": { "type": "string" },
            "directive": { "type": "string" }
        }
    })
}

/// Questions the assistant has already asked, in order, without duplicates.
pub fn extract_asked_questions(history: &[Message]) -> Vec<String> {
    let mut asked: Vec<String> = Vec::new();
    for message in history.iter().filter(|m| m.role == Role::Assistant) {
        let mut start = 0;
        for (index, c) in message.content.char_indices() {
            match c {
                '?' => {
                    let question = message.content[start..index + c.len_utf8()].trim();
                    if question.len() > 1 && !asked.iter().any(|q| q == question) {
                        asked.push(question.to_string());
                    }
                    start = index + c.len_utf8();
                }
                '.' | '!' | '\n' => start = index + c.len_utf8(),
                _ => {}
            }
        }
    }
    asked
}

fn token_set(text: &str) -> BTreeSet<String> {
    NormalizedText::new(text).tokens().iter().cloned().collect()
}

/// Jaccard similarity of the two questions' token sets.
pub fn question_similarity(a: &str, b: &str) -> f32 {
    let a = token_set(a);
    let b = token_set(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count() as f32;
    let union = a.union(&b).count() as f32;
    shared / union
}

/// Calls the reasoning provider and post-checks its assessment.
#[derive(Clone)]
pub struct StrategyAnalyzer {
    provider: Arc<dyn GenerationProvider>,
}

impl StrategyAnalyzer {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    #[instrument(name = "strategy_analyze", skip_all, fields(history_len = history.len()))]
    pub async fn analyze(
        &self,
        message: &str,
        history: &[Message],
        lead: &Lead,
    ) -> Result<StrategyAssessment, AppError> {
        let ledger = extract_asked_questions(history);
        let request = StructuredRequest {
            prompt: build_prompt(message, history, lead, &ledger),
            schema_name: SCHEMA_NAME.to_string(),
            schema: assessment_schema(),
            temperature: Some(STRATEGY_TEMPERATURE),
        };

        let raw = self.provider.structured(request).await?;
        let raw: RawAssessment = serde_json::from_value(raw)
            .map_err(|e| AppError::Schema(format!("Strategy assessment: {}", e)))?;
        let mut assessment = StrategyAssessment::try_from(raw)?;

        for question in ledger {
            if !assessment.already_asked.iter().any(|q| q == &question) {
                assessment.already_asked.push(question);
            }
        }
        guard_next_question(&mut assessment);

        debug!(
            phase = %assessment.phase,
            known = assessment.known_facts.known_fields().len(),
            asked = assessment.already_asked.len(),
            has_next_question = assessment.next_question.is_some(),
            "Strategy assessment ready"
        );
        Ok(assessment)
    }
}

/// Drop a proposed question that targets a known fact or repeats an asked one.
pub fn guard_next_question(assessment: &mut StrategyAssessment) {
    let Some(question) = assessment.next_question.as_deref() else {
        return;
    };

    if let Some(field) = assessment.known_facts.targeted_by(question) {
        debug!(field = field.key(), question, "Dropping question about a known fact");
        assessment.next_question = None;
        return;
    }

    let repeated = assessment
        .already_asked
        .iter()
        .any(|asked| question_similarity(asked, question) >= DUPLICATE_SIMILARITY);
    if repeated {
        debug!(question, "Dropping repeated question");
        assessment.next_question = None;
    }
}

fn build_prompt(message: &str, history: &[Message], lead: &Lead, ledger: &[String]) -> String {
    let transcript = history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Cliente",
                Role::Assistant => "Asistente",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let asked = if ledger.is_empty() {
        "(ninguna)".to_string()
    } else {
        ledger.iter().map(|q| format!("- {}", q)).collect::<Vec<_>>().join("\n")
    };

    format!(
        "Eres un estratega de ventas. Lee TODA la conversación y evalúa la situación.\n\n\
         Prospecto: {}\n\n\
         Conversación:\n{}\n\nMensaje nuevo del cliente: {}\n\n\
         Preguntas que el asistente ya hizo:\n{}\n\n\
         Reglas:\n\
         - Llena todos los datos conocidos; usa \"{}\" si no se conoce, nunca lo omitas.\n\
         - already_asked debe incluir cada pregunta ya hecha.\n\
         - next_question es UNA pregunta literal sobre un dato desconocido, o \"{}\".\n\
         - Nunca propongas preguntar algo ya respondido o ya preguntado.\n\
         - directive es la instrucción para la siguiente respuesta.",
        lead.describe(),
        if transcript.is_empty() { "(sin mensajes previos)" } else { transcript.as_str() },
        message,
        asked,
        UNKNOWN,
        NO_QUESTION,
    )
}
