//! Objection detection.
//!
//! Classifies the sales objection (if any) raised by the lead. Same matcher and table shape as the
//! tone detector, with its own weights.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::lexicon::{
    normalize_history, pattern, LexiconEntry, NormalizedText, ScoringWeights, SignalDetector,
    SignalResult, WeightedLexicon,
};

const HISTORY_LOOKBACK: usize = 5;

const NO_OBJECTION_GUIDANCE: &str = "";

/// Objection category raised by the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectionKind {
    None,
    Price,
    Timing,
    Trust,
    Competitor,
    Authority,
    NoNeed,
}

impl fmt::Display for ObjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl ObjectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectionKind::None => "none",
            ObjectionKind::Price => "price",
            ObjectionKind::Timing => "timing",
            ObjectionKind::Trust => "trust",
            ObjectionKind::Competitor => "competitor",
            ObjectionKind::Authority => "authority",
            ObjectionKind::NoNeed => "no_need",
        }
    }

    /// Spanish name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            ObjectionKind::None => "ninguna",
            ObjectionKind::Price => "precio",
            ObjectionKind::Timing => "tiempo / lo va a pensar",
            ObjectionKind::Trust => "confianza",
            ObjectionKind::Competitor => "ya usa otra solución",
            ObjectionKind::Authority => "necesita consultarlo",
            ObjectionKind::NoNeed => "no ve la necesidad",
        }
    }

    pub fn is_some(&self) -> bool {
        !matches!(self, ObjectionKind::None)
    }

    /// Parse a free-form category (e.g. from the strategy analyzer).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "price" | "precio" => Some(ObjectionKind::Price),
            "timing" | "tiempo" => Some(ObjectionKind::Timing),
            "trust" | "confianza" => Some(ObjectionKind::Trust),
            "competitor" | "competencia" => Some(ObjectionKind::Competitor),
            "authority" | "autoridad" => Some(ObjectionKind::Authority),
            "no_need" | "necesidad" => Some(ObjectionKind::NoNeed),
            "none" | "ninguna" | "" => Some(ObjectionKind::None),
            _ => None,
        }
    }
}

static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(muy|demasiado|bastante|algo|super)\s+car[oa]s?\b"),
        pattern(r"\bno (me alcanza|tengo (el )?(dinero|presupuesto))\b"),
        pattern(r"\bse (me|nos) sale del presupuesto\b"),
    ]
});

static TIMING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(lo|la) (voy a )?(pienso|pensar|pensare)\b"),
        pattern(r"\b(mas adelante|el proximo mes|en unos meses|otro momento)\b"),
        pattern(r"\b(luego|despues) (lo vemos|te (aviso|digo|escribo|confirmo))\b"),
        pattern(r"\bahorita no\b"),
    ]
});

static TRUST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(de verdad|en serio|realmente) (funciona|sirve)"),
        pattern(r"\bno (confio|me da confianza)\b"),
    ]
});

static COMPETITOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\bya (tengo|uso|usamos|contrate|trabajo con)\b"),
        pattern(r"\b(otra|otro) (empresa|proveedor|sistema|bot)\b"),
    ]
});

static AUTHORITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\b(consultar|platicar|hablar|ver)(lo)? con mi (socio|socia|jefe|jefa|esposo|esposa|pareja|contador)\b"),
        pattern(r"\bno (soy|decido) (yo|quien decide)\b"),
    ]
});

static NO_NEED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\bno (lo )?(necesito|ocupo|me interesa)\b"),
        pattern(r"\b(asi|como) estoy bien\b"),
    ]
});

/// Default objection table. Row order is the tie-break order.
pub fn default_lexicon() -> WeightedLexicon<ObjectionKind> {
    WeightedLexicon::new(
        vec![
            LexiconEntry::new(
                ObjectionKind::Price,
                &["caro", "cara", "costoso", "descuento", "mas barato", "sin presupuesto"],
                PRICE_PATTERNS.clone(),
                "Objeción de precio: valida la preocupación, compara el costo con una venta perdida al mes y ofrece el plan de entrada o pago mensual. No ofrezcas descuentos por iniciativa propia.",
            ),
            LexiconEntry::new(
                ObjectionKind::Timing,
                &["lo pienso", "lo voy a pensar", "mas adelante", "otro momento", "no es buen momento"],
                TIMING_PATTERNS.clone(),
                "Objeción de tiempo: respeta la decisión, pregunta qué información le ayudaría a decidir y propone un seguimiento concreto con fecha.",
            ),
            LexiconEntry::new(
                ObjectionKind::Trust,
                &["estafa", "fraude", "no confio", "garantia", "referencias", "resenas"],
                TRUST_PATTERNS.clone(),
                "Objeción de confianza: comparte un caso real de un negocio similar y ofrece una demo en vivo sin compromiso.",
            ),
            LexiconEntry::new(
                ObjectionKind::Competitor,
                &["ya tengo", "ya uso", "competencia", "otro proveedor", "manychat", "otra empresa"],
                COMPETITOR_PATTERNS.clone(),
                "Ya usa otra solución: pregunta qué le gustaría mejorar de su herramienta actual y diferencia con una sola ventaja concreta. Nunca hables mal del competidor.",
            ),
            LexiconEntry::new(
                ObjectionKind::Authority,
                &["mi socio", "mi socia", "mi jefe", "mi esposa", "mi esposo", "consultarlo", "no decido"],
                AUTHORITY_PATTERNS.clone(),
                "Necesita consultarlo: ofrece enviar un resumen breve para quien decide o incluirlo en la demo.",
            ),
            LexiconEntry::new(
                ObjectionKind::NoNeed,
                &["no me interesa", "no lo necesito", "no necesito", "estoy bien asi"],
                NO_NEED_PATTERNS.clone(),
                "No ve la necesidad: haz una sola pregunta sobre cuántos mensajes sin responder tiene al día; si insiste, agradece y cierra con amabilidad.",
            ),
        ],
        ScoringWeights {
            keyword: 0.40,
            pattern: 0.50,
            history: 0.10,
            history_cap: 0.20,
            saturation: 1.0,
            min_confidence: 0.35,
        },
    )
}

/// Objection detector.
pub struct ObjectionDetector {
    lexicon: WeightedLexicon<ObjectionKind>,
}

impl Default for ObjectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectionDetector {
    pub fn new() -> Self {
        Self::with_lexicon(default_lexicon())
    }

    pub fn with_lexicon(lexicon: WeightedLexicon<ObjectionKind>) -> Self {
        Self { lexicon }
    }

    /// Handling guidance for a category, e.g. one reported by the strategy analyzer.
    pub fn guidance_for(&self, kind: ObjectionKind) -> &str {
        self.lexicon.guidance(kind).unwrap_or(NO_OBJECTION_GUIDANCE)
    }
}

impl SignalDetector for ObjectionDetector {
    type Label = ObjectionKind;

    fn detect(&self, current: &str, history: &[&str]) -> SignalResult<ObjectionKind> {
        let current = NormalizedText::new(current);
        let history = normalize_history(history, HISTORY_LOOKBACK);
        let best = WeightedLexicon::best(self.lexicon.score_all(&current, &history));
        self.lexicon
            .resolve(best, ObjectionKind::None, NO_OBJECTION_GUIDANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_objection() {
        let detector = ObjectionDetector::new();
        let result = detector.detect("Está muy caro para mí ahorita", &[]);
        assert_eq!(result.label, ObjectionKind::Price);
        assert!(result.guidance.contains("precio"));
    }

    #[test]
    fn test_timing_objection() {
        let detector = ObjectionDetector::new();
        let result = detector.detect("Déjame lo pienso y te aviso más adelante", &[]);
        assert_eq!(result.label, ObjectionKind::Timing);
    }

    #[test]
    fn test_competitor_objection() {
        let detector = ObjectionDetector::new();
        let result = detector.detect("Ya uso otro sistema para eso", &[]);
        assert_eq!(result.label, ObjectionKind::Competitor);
    }

    #[test]
    fn test_authority_objection() {
        let detector = ObjectionDetector::new();
        let result = detector.detect("Tengo que consultarlo con mi socio", &[]);
        assert_eq!(result.label, ObjectionKind::Authority);
    }

    #[test]
    fn test_no_objection() {
        let detector = ObjectionDetector::new();
        let result = detector.detect("Perfecto, ¿me mandas el link?", &[]);
        assert_eq!(result.label, ObjectionKind::None);
    }

    #[test]
    fn test_pricing_question_is_not_an_objection() {
        let detector = ObjectionDetector::new();
        for text in ["¿Qué precio tiene el plan pro?", "¿Cuál es el precio?", "¿Cuánto es el presupuesto mínimo?"] {
            assert_eq!(detector.detect(text, &[]).label, ObjectionKind::None, "{}", text);
        }
    }

    #[test]
    fn test_follow_up_questions_are_not_deferrals() {
        let detector = ObjectionDetector::new();
        for text in ["Va, ¿y luego cómo le hago para pagar?", "¿Y después de pagar qué sigue?"] {
            assert_eq!(detector.detect(text, &[]).label, ObjectionKind::None, "{}", text);
        }
    }

    #[test]
    fn test_postponement_phrasing_is_timing() {
        let detector = ObjectionDetector::new();
        assert_eq!(detector.detect("Luego te aviso", &[]).label, ObjectionKind::Timing);
        assert_eq!(detector.detect("Mejor en otro momento", &[]).label, ObjectionKind::Timing);
    }

    #[test]
    fn test_parse_categories() {
        assert_eq!(ObjectionKind::parse("Precio"), Some(ObjectionKind::Price));
        assert_eq!(ObjectionKind::parse("none"), Some(ObjectionKind::None));
        assert_eq!(ObjectionKind::parse("weather"), None);
    }
}
