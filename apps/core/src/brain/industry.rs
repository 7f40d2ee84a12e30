//! Industry (domain vertical) detection.
//!
//! Scans verticals in table order and stops at the first one with two independent keyword
//! matches; otherwise the best-scoring vertical wins if it clears the floor.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::lexicon::{
    normalize_history, pattern, LexiconEntry, NormalizedText, ScoringWeights, SignalDetector,
    SignalResult, WeightedLexicon,
};

const HISTORY_LOOKBACK: usize = 5;

/// Keyword matches that settle the verdict without scanning the rest of the table.
pub const EARLY_EXIT_MATCHES: usize = 2;

const GENERAL_GUIDANCE: &str = "";

/// Business vertical of the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    General,
    Restaurant,
    RealEstate,
    Health,
    Beauty,
    Education,
    Retail,
    Automotive,
    Fitness,
    ProfessionalServices,
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Industry {
    pub fn label(&self) -> &'static str {
        match self {
            Industry::General => "general",
            Industry::Restaurant => "restaurant",
            Industry::RealEstate => "real_estate",
            Industry::Health => "health",
            Industry::Beauty => "beauty",
            Industry::Education => "education",
            Industry::Retail => "retail",
            Industry::Automotive => "automotive",
            Industry::Fitness => "fitness",
            Industry::ProfessionalServices => "professional_services",
        }
    }

    /// Display name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Industry::General => "General",
            Industry::Restaurant => "Restaurantes y comida",
            Industry::RealEstate => "Inmobiliaria",
            Industry::Health => "Salud y clínicas",
            Industry::Beauty => "Belleza y estética",
            Industry::Education => "Educación",
            Industry::Retail => "Comercio y tienda en línea",
            Industry::Automotive => "Automotriz",
            Industry::Fitness => "Gimnasios y bienestar",
            Industry::ProfessionalServices => "Servicios profesionales",
        }
    }
}

static RESTAURANT_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![pattern(r"\b(pedidos?|entregas?) a domicilio\b")]);

static REAL_ESTATE_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![pattern(r"\b(vendo|rento|renta de) (casas?|departamentos?|terrenos?)\b")]);

static HEALTH_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![pattern(r"\b(agendar|agenda de) (citas|pacientes)\b")]);

static RETAIL_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![pattern(r"\b(tienda|venta) (en linea|online)\b")]);

/// Default vertical table. Row order is both the scan order and the tie-break order.
pub fn default_lexicon() -> WeightedLexicon<Industry> {
    WeightedLexicon::new(
        vec![
            LexiconEntry::new(
                Industry::Restaurant,
                &["restaurante", "restaurant", "cafeteria", "comida", "menu", "reservaciones", "taqueria", "pizzeria", "cocina", "meseros"],
                RESTAURANT_PATTERNS.clone(),
                "Negocio de comida: los mensajes giran en torno a pedidos, reservaciones, menú y horarios. Destaca toma de pedidos automática por WhatsApp y confirmación de reservaciones.",
            ),
            LexiconEntry::new(
                Industry::RealEstate,
                &["inmobiliaria", "bienes raices", "propiedades", "departamentos", "casas", "terrenos", "renta", "asesor inmobiliario"],
                REAL_ESTATE_PATTERNS.clone(),
                "Inmobiliaria: los prospectos preguntan por ubicación, precio y visitas. Destaca la precalificación automática de interesados y el agendado de visitas.",
            ),
            LexiconEntry::new(
                Industry::Health,
                &["clinica", "consultorio", "dentista", "doctor", "doctora", "pacientes", "medico", "citas medicas", "hospital", "psicologo"],
                HEALTH_PATTERNS.clone(),
                "Salud: la prioridad es agendar y confirmar citas y reducir inasistencias. Cuida el tono profesional y la confidencialidad.",
            ),
            LexiconEntry::new(
                Industry::Beauty,
                &["salon", "estetica", "barberia", "spa", "unas", "pestanas", "maquillaje", "peluqueria"],
                Vec::new(),
                "Belleza: clientes reservan por WhatsApp a toda hora. Destaca la agenda automática, recordatorios y la venta de paquetes.",
            ),
            LexiconEntry::new(
                Industry::Education,
                &["escuela", "colegio", "cursos", "alumnos", "academia", "inscripciones", "clases", "universidad"],
                Vec::new(),
                "Educación: los mensajes son dudas de inscripción, costos y horarios. Destaca respuestas inmediatas y seguimiento de interesados.",
            ),
            LexiconEntry::new(
                Industry::Retail,
                &["tienda", "ecommerce", "productos", "inventario", "catalogo", "mayoreo", "envios", "boutique", "ropa"],
                RETAIL_PATTERNS.clone(),
                "Comercio: preguntas de disponibilidad, precio y envíos. Destaca el catálogo por WhatsApp, recuperación de carritos y cobro por enlace.",
            ),
            LexiconEntry::new(
                Industry::Automotive,
                &["taller", "agencia de autos", "autos", "refacciones", "carros", "seminuevos", "mecanico"],
                Vec::new(),
                "Automotriz: cotizaciones, citas de servicio y pruebas de manejo. Destaca la calificación de interesados y el agendado de servicio.",
            ),
            LexiconEntry::new(
                Industry::Fitness,
                &["gimnasio", "gym", "entrenador", "crossfit", "yoga", "membresias", "nutriologo"],
                Vec::new(),
                "Bienestar: consultas por membresías, horarios y clases de prueba. Destaca la conversión de clases de prueba y la renovación de membresías.",
            ),
            LexiconEntry::new(
                Industry::ProfessionalServices,
                &["despacho", "abogado", "contador", "contabilidad", "consultoria", "agencia", "notaria", "seguros"],
                Vec::new(),
                "Servicios profesionales: los prospectos buscan confianza y una primera consulta. Destaca el filtrado de casos y el agendado de asesorías.",
            ),
        ],
        ScoringWeights {
            keyword: 0.40,
            pattern: 0.40,
            history: 0.15,
            history_cap: 0.30,
            saturation: 1.0,
            min_confidence: 0.35,
        },
    )
}

/// Domain-vertical detector.
pub struct IndustryDetector {
    lexicon: WeightedLexicon<Industry>,
}

impl Default for IndustryDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl IndustryDetector {
    pub fn new() -> Self {
        Self::with_lexicon(default_lexicon())
    }

    pub fn with_lexicon(lexicon: WeightedLexicon<Industry>) -> Self {
        Self { lexicon }
    }

    /// Detect with an optional industry already recorded on the lead profile.
    ///
    /// A hint that maps onto a vertical settles the verdict with full confidence.
    pub fn detect_with_hint(
        &self,
        current: &str,
        history: &[&str],
        hint: Option<&str>,
    ) -> SignalResult<Industry> {
        if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
            let hinted = NormalizedText::new(hint);
            for entry in self.lexicon.entries() {
                let score = self.lexicon.score_entry(entry, &hinted, &[]);
                if score.keyword_hits > 0 {
                    return SignalResult {
                        label: entry.label,
                        confidence: 1.0,
                        signals: vec![format!("lead_profile:{}", hint)],
                        guidance: entry.guidance.clone(),
                    };
                }
            }
        }
        self.detect(current, history)
    }
}

impl SignalDetector for IndustryDetector {
    type Label = Industry;

    fn detect(&self, current: &str, history: &[&str]) -> SignalResult<Industry> {
        let current = NormalizedText::new(current);
        let history = normalize_history(history, HISTORY_LOOKBACK);

        let mut scores = Vec::with_capacity(self.lexicon.entries().len());
        for entry in self.lexicon.entries() {
            let score = self.lexicon.score_entry(entry, &current, &history);
            if score.distinct_keywords >= EARLY_EXIT_MATCHES {
                return self
                    .lexicon
                    .resolve(Some(score), Industry::General, GENERAL_GUIDANCE);
            }
            scores.push(score);
        }

        let best = WeightedLexicon::best(scores);
        self.lexicon
            .resolve(best, Industry::General, GENERAL_GUIDANCE)
    }
}
