//! Fast-path gate.
//!
//! Decides whether a turn is trivial enough to skip the strategy analyzer. The policy is biased
//! toward false negatives: any cue of an objection, a handoff request or a multi-part message
//! sends the turn down the full path.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::intent::GREETING_WORDS;
use super::lexicon::{normalize_phrase, pattern, NormalizedText};

/// Why the gate decided the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "route", content = "reason")]
pub enum FastPathDecision {
    /// Bare greeting early in the conversation.
    Greeting,
    /// Generic pricing / FAQ phrasing.
    Faq,
    /// Very short reply while the conversation is still short.
    ShortReply,
    /// Full analysis required; carries the deciding cue.
    Full(String),
}

impl FastPathDecision {
    pub fn is_simple(&self) -> bool {
        !matches!(self, FastPathDecision::Full(_))
    }
}

static FAQ_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"^[¿\s]*cuanto (cuesta|cobran|sale|vale)\b"),
        pattern(r"^[¿\s]*(precio|precios|costo|costos|planes|tarifas)\b"),
        pattern(r"\bque incluye\b"),
        pattern(r"\b(cual es (el|su) )?horario\b"),
        pattern(r"^[¿\s]*como funciona\b"),
        pattern(r"\btienen (prueba gratis|periodo de prueba|demo)\b"),
        pattern(r"\baceptan (tarjeta|transferencia|oxxo)\b"),
        pattern(r"\bfunciona con (whatsapp|instagram|facebook)\b"),
    ]
});

/// Cues that always force full analysis.
const BLOCKING_CUES: &[&str] = &[
    "no",
    "pero",
    "caro",
    "cara",
    "descuento",
    "pienso",
    "pensarlo",
    "despues",
    "humano",
    "asesor",
    "persona",
    "ya tengo",
    "ya uso",
    "socio",
    "jefe",
    "estafa",
    "confio",
    "garantia",
    "cancelar",
    "queja",
    "molesto",
];

/// The only words allowed after a greeting for it to stay a bare greeting.
const OPENER_TAILS: &[&str] = &[
    "vi su anuncio",
    "vi tu anuncio",
    "vi el anuncio",
    "vi su publicacion",
    "vengo del anuncio",
    "como estas",
    "como esta",
    "que tal",
    "info",
    "informacion",
    "quiero informacion",
    "quisiera informacion",
    "mas informacion",
    "me interesa",
];

/// Tunable gate in front of the strategy analyzer.
#[derive(Debug, Clone)]
pub struct FastPathPolicy {
    /// A bare greeting is simple while history holds at most this many messages.
    pub greeting_max_history: usize,
    /// FAQ phrasings longer than this are not treated as generic.
    pub faq_max_tokens: usize,
    /// Replies up to this many tokens are simple...
    pub short_max_tokens: usize,
    /// ...while history holds at most this many messages.
    pub short_max_history: usize,
    faq_patterns: Vec<Regex>,
    greeting_phrases: Vec<Vec<String>>,
    opener_tails: Vec<Vec<String>>,
    blocking_cues: Vec<String>,
}

impl Default for FastPathPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl FastPathPolicy {
    pub fn new() -> Self {
        let mut greeting_phrases: Vec<Vec<String>> = GREETING_WORDS
            .iter()
            .map(|g| NormalizedText::new(g).tokens().to_vec())
            .collect();
        // Longest phrase first so "buenas tardes" is stripped before "buenas".
        greeting_phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));

        Self {
            greeting_max_history: 2,
            faq_max_tokens: 8,
            short_max_tokens: 3,
            short_max_history: 4,
            faq_patterns: FAQ_PATTERNS.clone(),
            greeting_phrases,
            opener_tails: OPENER_TAILS
                .iter()
                .map(|t| NormalizedText::new(t).tokens().to_vec())
                .collect(),
            blocking_cues: BLOCKING_CUES.iter().map(|c| normalize_phrase(c)).collect(),
        }
    }

    /// `true` when the strategy analyzer can be skipped.
    pub fn is_simple(&self, message: &str, history_len: usize) -> bool {
        self.evaluate(message, history_len).is_simple()
    }

    /// Full decision with its reason, for logging and tests.
    pub fn evaluate(&self, message: &str, history_len: usize) -> FastPathDecision {
        let text = NormalizedText::new(message);
        if text.is_empty() {
            return FastPathDecision::Full("empty_message".to_string());
        }
        if let Some(cue) = self.blocking_cue(&text) {
            return FastPathDecision::Full(format!("cue:{}", cue.trim()));
        }
        if text.question_marks() > 1 {
            return FastPathDecision::Full("multiple_questions".to_string());
        }

        if history_len <= self.greeting_max_history && self.is_bare_greeting(&text) {
            return FastPathDecision::Greeting;
        }

        if text.token_count() <= self.faq_max_tokens
            && self.faq_patterns.iter().any(|p| p.is_match(&text.folded))
        {
            return FastPathDecision::Faq;
        }

        if history_len <= self.short_max_history && text.token_count() <= self.short_max_tokens {
            return FastPathDecision::ShortReply;
        }

        FastPathDecision::Full("default".to_string())
    }

    fn blocking_cue<'a>(&'a self, text: &NormalizedText) -> Option<&'a str> {
        self.blocking_cues
            .iter()
            .find(|cue| text.contains_phrase(cue))
            .map(String::as_str)
    }

    /// A greeting, optionally followed by a known opener such as "vi su anuncio", and no question.
    fn is_bare_greeting(&self, text: &NormalizedText) -> bool {
        let tokens = text.tokens();
        let mut index = 0;
        loop {
            let matched = self
                .greeting_phrases
                .iter()
                .find(|phrase| !phrase.is_empty() && tokens[index..].starts_with(phrase));
            match matched {
                Some(phrase) => index += phrase.len(),
                None => break,
            }
        }
        let tail = &tokens[index..];
        index > 0
            && text.question_marks() == 0
            && (tail.is_empty() || self.opener_tails.iter().any(|opener| opener.as_slice() == tail))
    }
}
