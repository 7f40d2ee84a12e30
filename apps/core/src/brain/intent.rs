//! Intent cues using keyword tables and regex patterns.
//!
//! Fast pattern-based detection of what the lead is trying to do in this message (greet, ask for a
//! human, buy, book a demo, ask for pricing). Feeds the dialogue state machine and the fast path.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::lexicon::{
    pattern, LexiconEntry, NormalizedText, ScoringWeights, SignalDetector, SignalResult,
    WeightedLexicon,
};

/// Detected intent type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Greeting (hola, buenas, etc.)
    Greeting,
    /// Wants to talk to a person
    HumanRequest,
    /// Ready to pay or sign up
    PurchaseIntent,
    /// Wants to see a demo or book a call
    DemoRequest,
    /// Asks how much it costs
    PricingQuestion,
    /// Any other question
    Question,
    /// Unknown/Default
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    /// Returns a human-readable label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::HumanRequest => "human_request",
            Intent::PurchaseIntent => "purchase_intent",
            Intent::DemoRequest => "demo_request",
            Intent::PricingQuestion => "pricing_question",
            Intent::Question => "question",
            Intent::Unknown => "conversation",
        }
    }
}

// Greeting keywords, also used by the fast path to strip the greeting from a message.
pub const GREETING_WORDS: &[&str] = &[
    "hola",
    "holi",
    "buenas",
    "buen dia",
    "buenos dias",
    "buenas tardes",
    "buenas noches",
    "que tal",
    "saludos",
    "hey",
    "hi",
    "hello",
];

static GREETING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"^[¡!\s]*(hola+|holi|buenas|buen(os)? dias?|que tal|saludos|hey|hi|hello)\b"),
    ]
});

static HUMAN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(hablar|comunicarme|platicar) con (un|una|alguien|una persona|un humano|un asesor|ventas)\b"),
        pattern(r"\b(eres|es) (un )?(bot|robot|maquina)\b"),
        pattern(r"\b(me (llamas|marcas)|llamenme|marquenme)\b"),
    ]
});

static PURCHASE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(lo|la) (quiero|compro|contrato|tomo)\b"),
        pattern(r"\b(como|donde) (pago|le pago|contrato|me inscribo)\b"),
        pattern(r"\b(mandame|pasame|enviame) (el )?(link|enlace|liga) de pago\b"),
    ]
});

static DEMO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(agendar|agendemos|programar) (una )?(demo|llamada|reunion|cita)\b"),
        pattern(r"\b(ver|verlo) (funcionando|en vivo)\b"),
    ]
});

static PRICING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\bcuanto (cuesta|cobran|sale|vale|es)\b"),
        pattern(r"\b(precio|precios|costo|costos|planes|tarifas)\b\s*\??$"),
    ]
});

static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\?"),
        pattern(r"^[¿\s]*(como|que|cual|cuales|cuando|donde|quien|por que|puedo|se puede)\b"),
    ]
});

/// Default intent table. Row order is the tie-break order, most specific first. The `Question`
/// row is a fallback and is resolved separately.
pub fn default_lexicon() -> WeightedLexicon<Intent> {
    WeightedLexicon::new(
        vec![
            LexiconEntry::new(
                Intent::HumanRequest,
                &["humano", "persona real", "asesor", "agente", "ejecutivo", "alguien de ventas"],
                HUMAN_PATTERNS.clone(),
                "Pide hablar con una persona.",
            ),
            LexiconEntry::new(
                Intent::PurchaseIntent,
                &["lo quiero", "quiero contratar", "link de pago", "como pago", "contratar", "me apunto", "tarjeta"],
                PURCHASE_PATTERNS.clone(),
                "Muestra intención de compra.",
            ),
            LexiconEntry::new(
                Intent::DemoRequest,
                &["demo", "demostracion", "videollamada", "agendar", "reunion", "llamada"],
                DEMO_PATTERNS.clone(),
                "Quiere ver una demo o agendar una llamada.",
            ),
            LexiconEntry::new(
                Intent::PricingQuestion,
                &["cuanto cuesta", "precio", "precios", "costo", "planes", "tarifas", "mensualidad"],
                PRICING_PATTERNS.clone(),
                "Pregunta por precios.",
            ),
            LexiconEntry::new(
                Intent::Greeting,
                GREETING_WORDS,
                GREETING_PATTERNS.clone(),
                "Saluda.",
            ),
            LexiconEntry::new(
                Intent::Question,
                &["pregunta", "duda", "dudas"],
                QUESTION_PATTERNS.clone(),
                "Hace una pregunta.",
            ),
        ],
        ScoringWeights {
            keyword: 0.40,
            pattern: 0.60,
            history: 0.0,
            history_cap: 0.0,
            saturation: 1.0,
            min_confidence: 0.40,
        },
    )
}

/// Intent classifier over the current message only.
pub struct IntentClassifier {
    lexicon: WeightedLexicon<Intent>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a new intent classifier with all patterns
    pub fn new() -> Self {
        Self::with_lexicon(default_lexicon())
    }

    pub fn with_lexicon(lexicon: WeightedLexicon<Intent>) -> Self {
        Self { lexicon }
    }

    /// Classify the intent of a text
    pub fn classify(&self, text: &str) -> SignalResult<Intent> {
        let text = text.trim();
        if text.is_empty() {
            return SignalResult::neutral(Intent::Unknown, 0.0, "");
        }
        let current = NormalizedText::new(text);
        let (generic, specific): (Vec<_>, Vec<_>) = self
            .lexicon
            .score_all(&current, &[])
            .into_iter()
            .partition(|s| s.label == Intent::Question);

        // `Question` only wins when no specific intent clears the floor.
        let result = self.lexicon.resolve(WeightedLexicon::best(specific), Intent::Unknown, "");
        if result.label != Intent::Unknown {
            return result;
        }
        self.lexicon.resolve(WeightedLexicon::best(generic), Intent::Unknown, "")
    }
}

impl SignalDetector for IntentClassifier {
    type Label = Intent;

    fn detect(&self, current: &str, _history: &[&str]) -> SignalResult<Intent> {
        self.classify(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_detection() {
        let classifier = IntentClassifier::new();

        assert_eq!(classifier.classify("Hola!").label, Intent::Greeting);
        assert_eq!(classifier.classify("Buenas tardes").label, Intent::Greeting);
        assert_eq!(classifier.classify("Hola, vi su anuncio").label, Intent::Greeting);
    }

    #[test]
    fn test_human_request_detection() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("Quiero hablar con un asesor por favor");
        assert_eq!(result.label, Intent::HumanRequest);

        let result = classifier.classify("¿Eres un bot?");
        assert_eq!(result.label, Intent::HumanRequest);
    }

    #[test]
    fn test_purchase_detection() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("Va, lo quiero. Mándame el link de pago");
        assert_eq!(result.label, Intent::PurchaseIntent);
    }

    #[test]
    fn test_demo_detection() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("¿Podemos agendar una demo?");
        assert_eq!(result.label, Intent::DemoRequest);
    }

    #[test]
    fn test_pricing_detection() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("¿Cuánto cuesta?");
        assert_eq!(result.label, Intent::PricingQuestion);
    }

    #[test]
    fn test_question_form_keeps_specific_intent() {
        let classifier = IntentClassifier::new();

        let cases = [
            ("¿Me comunicas con un humano?", Intent::HumanRequest),
            ("¿Me pasas con un asesor?", Intent::HumanRequest),
            ("¿Podemos hacer una demo?", Intent::DemoRequest),
            ("¿Aceptan tarjeta?", Intent::PurchaseIntent),
            ("¿Qué precio tiene el plan pro?", Intent::PricingQuestion),
        ];
        for (text, expected) in cases {
            assert_eq!(classifier.classify(text).label, expected, "{}", text);
        }
    }

    #[test]
    fn test_plain_question_falls_back_to_question() {
        let classifier = IntentClassifier::new();

        assert_eq!(classifier.classify("¿Funciona con WhatsApp Business?").label, Intent::Question);
        assert_eq!(classifier.classify("¿Qué incluye?").label, Intent::Question);
    }

    #[test]
    fn test_unknown_detection() {
        let classifier = IntentClassifier::new();

        assert_eq!(classifier.classify("").label, Intent::Unknown);
        assert_eq!(classifier.classify("   ").label, Intent::Unknown);
        assert_eq!(classifier.classify("tengo una tienda").label, Intent::Unknown);
    }
}
