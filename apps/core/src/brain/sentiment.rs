//! Sentiment (tone) detection.
//!
//! Keyword and pattern matching over Spanish chat text, corroborated by the shape of the last
//! few user messages (many short replies read as "busy", many questions as "curious").

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::lexicon::{
    normalize_history, pattern, LabelScore, LexiconEntry, NormalizedText, ScoringWeights,
    SignalDetector, SignalResult, WeightedLexicon,
};

/// How many past user messages are scanned for corroborating signals.
pub const HISTORY_LOOKBACK: usize = 5;

const SHORT_MESSAGE_TOKENS: usize = 4;
const SHORT_MESSAGE_QUORUM: usize = 3;
const QUESTION_QUORUM: usize = 3;
const SHAPE_BONUS: f32 = 0.2;

const NEUTRAL_GUIDANCE: &str =
    "Tono neutral: responde de forma cordial, clara y breve, sin exagerar el entusiasmo.";

/// Detected tone of the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Neutral,
    /// Price-objection family
    PriceSensitive,
    Frustrated,
    Skeptical,
    Busy,
    Urgent,
    Curious,
    Excited,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Neutral => "neutral",
            Sentiment::PriceSensitive => "price_sensitive",
            Sentiment::Frustrated => "frustrated",
            Sentiment::Skeptical => "skeptical",
            Sentiment::Busy => "busy",
            Sentiment::Urgent => "urgent",
            Sentiment::Curious => "curious",
            Sentiment::Excited => "excited",
        }
    }

    /// Whether the tone belongs to the price-objection family.
    pub fn is_price_objection(&self) -> bool {
        matches!(self, Sentiment::PriceSensitive)
    }
}

static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(muy|demasiado|bastante|algo|super)\s+car[oa]s?\b"),
        pattern(r"\bno (me alcanza|tengo (el )?(dinero|presupuesto|lana))\b"),
        pattern(r"\b(hay|tienen|dan) (algun )?descuento"),
    ]
});

static FRUSTRATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\bya (te|les) (dije|explique|conteste)\b"),
        pattern(r"\bno (me )?(entiendes|entienden|estas entendiendo)\b"),
        pattern(r"!{2,}"),
    ]
});

static SKEPTIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(de verdad|en serio|realmente) (funciona|sirve)"),
        pattern(r"\bcomo se que\b"),
    ]
});

static URGENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(lo )?(necesito|ocupo) (ya|hoy|urgente)\b"),
        pattern(r"\bcuanto antes\b"),
    ]
});

static CURIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"^[¿\s]*(como|que|cual|cuanto|cuando|donde|por que)\b"),
        pattern(r"\b(me explicas|cuentame|me platicas)\b"),
    ]
});

static EXCITED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(me encanta|que padre|suena (muy )?bien|me interesa mucho)\b"),
        pattern(r"\b(justo|exactamente) lo que (necesito|buscaba)\b"),
    ]
});

/// Default tone table. Row order is the tie-break order.
pub fn default_lexicon() -> WeightedLexicon<Sentiment> {
    WeightedLexicon::new(
        vec![
            LexiconEntry::new(
                Sentiment::PriceSensitive,
                &["caro", "cara", "costoso", "carisimo", "presupuesto", "descuento", "barato", "no me alcanza", "precio alto"],
                PRICE_PATTERNS.clone(),
                "El prospecto es sensible al precio: no bajes el precio de inmediato. Reencuadra en valor y retorno (ventas recuperadas, horas ahorradas) y ofrece el plan de entrada si aplica.",
            ),
            LexiconEntry::new(
                Sentiment::Frustrated,
                &["molesto", "harto", "pesimo", "terrible", "ya te dije", "no sirve", "que mal"],
                FRUSTRATION_PATTERNS.clone(),
                "El prospecto está frustrado: reconoce su molestia en una frase, no repitas preguntas y ve directo a la solución.",
            ),
            LexiconEntry::new(
                Sentiment::Skeptical,
                &["estafa", "no confio", "desconfio", "garantia", "referencias", "sera cierto", "no creo"],
                SKEPTIC_PATTERNS.clone(),
                "El prospecto duda: usa prueba social concreta (casos de clientes similares) y ofrece una demo sin compromiso.",
            ),
            LexiconEntry::new(
                Sentiment::Busy,
                &["ocupado", "ocupada", "rapido", "no tengo tiempo", "al grano", "breve"],
                Vec::new(),
                "El prospecto tiene poco tiempo: responde en una o dos frases y haz como máximo una pregunta.",
            ),
            LexiconEntry::new(
                Sentiment::Urgent,
                &["urgente", "hoy mismo", "ya mismo", "lo antes posible", "asap"],
                URGENT_PATTERNS.clone(),
                "El prospecto tiene urgencia: propone el siguiente paso concreto hoy mismo (demo o enlace de pago).",
            ),
            LexiconEntry::new(
                Sentiment::Curious,
                &["como funciona", "me explicas", "informacion", "info", "detalles", "que incluye"],
                CURIOUS_PATTERNS.clone(),
                "El prospecto está explorando: responde su duda con un ejemplo aplicado a su negocio y termina con una pregunta de descubrimiento.",
            ),
            LexiconEntry::new(
                Sentiment::Excited,
                &["genial", "excelente", "perfecto", "me encanta", "increible", "padrisimo"],
                EXCITED_PATTERNS.clone(),
                "El prospecto está entusiasmado: aprovecha el impulso y propone el siguiente paso sin rodeos.",
            ),
        ],
        ScoringWeights {
            keyword: 0.35,
            pattern: 0.45,
            history: 0.10,
            history_cap: 0.30,
            saturation: 1.0,
            min_confidence: 0.30,
        },
    )
}

/// Tone detector over a weighted lexicon plus history-shape heuristics.
pub struct SentimentDetector {
    lexicon: WeightedLexicon<Sentiment>,
}

impl Default for SentimentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentDetector {
    pub fn new() -> Self {
        Self::with_lexicon(default_lexicon())
    }

    pub fn with_lexicon(lexicon: WeightedLexicon<Sentiment>) -> Self {
        Self { lexicon }
    }

    /// Secondary signals from the shape of recent messages.
    fn apply_history_shape(
        scores: &mut [LabelScore<Sentiment>],
        current: &NormalizedText,
        history: &[NormalizedText],
    ) {
        let short = history
            .iter()
            .filter(|h| !h.is_empty() && h.token_count() <= SHORT_MESSAGE_TOKENS)
            .count();
        let questions: usize =
            history.iter().map(|h| h.question_marks()).sum::<usize>() + current.question_marks();

        for score in scores.iter_mut() {
            if score.label == Sentiment::Busy && short >= SHORT_MESSAGE_QUORUM {
                score.score += SHAPE_BONUS;
                score.evidence.push(format!("history:{}_short_messages", short));
            }
            if score.label == Sentiment::Curious && questions >= QUESTION_QUORUM {
                score.score += SHAPE_BONUS;
                score.evidence.push(format!("history:{}_questions", questions));
            }
        }
    }
}

impl SignalDetector for SentimentDetector {
    type Label = Sentiment;

    fn detect(&self, current: &str, history: &[&str]) -> SignalResult<Sentiment> {
        let current = NormalizedText::new(current);
        let history = normalize_history(history, HISTORY_LOOKBACK);

        let mut scores = self.lexicon.score_all(&current, &history);
        Self::apply_history_shape(&mut scores, &current, &history);

        let best = WeightedLexicon::best(scores);
        self.lexicon.resolve(best, Sentiment::Neutral, NEUTRAL_GUIDANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_objection_detected() {
        let detector = SentimentDetector::new();
        let result = detector.detect("Está muy caro para mí ahorita", &[]);
        assert_eq!(result.label, Sentiment::PriceSensitive);
        assert!(result.label.is_price_objection());
        assert!(result.confidence >= 0.30);
        assert!(result.signals.iter().any(|s| s.contains("caro")));
    }

    #[test]
    fn test_neutral_for_plain_text() {
        let detector = SentimentDetector::new();
        let result = detector.detect("Tengo una tienda de ropa", &[]);
        assert_eq!(result.label, Sentiment::Neutral);
        assert!(result.signals.is_empty());
    }

    #[test]
    fn test_short_history_reads_as_busy() {
        let detector = SentimentDetector::new();
        let history = ["ok", "si", "va", "dale"];
        let result = detector.detect("ocupado", &history);
        assert_eq!(result.label, Sentiment::Busy);
        assert!(result.signals.iter().any(|s| s.contains("short_messages")));
    }

    #[test]
    fn test_many_questions_read_as_curious() {
        let detector = SentimentDetector::new();
        let history = ["¿y eso cómo es?", "¿funciona con Instagram?"];
        let result = detector.detect("¿Cómo funciona?", &history);
        assert_eq!(result.label, Sentiment::Curious);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = SentimentDetector::new();
        let history = ["hola", "¿cuánto cuesta?"];
        let a = detector.detect("No sé, se me hace caro", &history);
        let b = detector.detect("No sé, se me hace caro", &history);
        assert_eq!(a, b);
    }
}
