//! Few-shot example retrieval.
//!
//! Tags the current exchange with a keyword→tags table, then ranks a library of worked
//! conversations by tag overlap. Libraries are immutable reference data; retrieval only
//! filters and orders them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::lexicon::{normalize_phrase, NormalizedText};
use crate::error::AppError;

/// Default number of examples injected into a prompt.
pub const DEFAULT_MAX_EXAMPLES: usize = 2;

/// User messages (besides the current one) scanned for tags.
pub const TAG_LOOKBACK: usize = 3;

/// A pre-authored conversation used as in-context guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub id: String,
    pub tags: BTreeSet<String>,
    /// Situation the example applies to.
    pub context: String,
    pub transcript: String,
    pub why_it_worked: String,
}

impl ExampleRecord {
    /// Number of declared tags present in `detected`.
    pub fn overlap(&self, detected: &BTreeSet<String>) -> usize {
        self.tags.intersection(detected).count()
    }
}

/// Keyword → canonical tags. One keyword may widen recall to several related tags.
const TAG_TABLE: &[(&str, &[&str])] = &[
    ("caro", &["caro", "precio"]),
    ("cara", &["caro", "precio"]),
    ("precio", &["precio"]),
    ("cuanto cuesta", &["precio"]),
    ("costo", &["precio"]),
    ("descuento", &["caro", "precio", "descuento"]),
    ("presupuesto", &["precio", "presupuesto"]),
    ("lo pienso", &["pensarlo", "seguimiento"]),
    ("lo voy a pensar", &["pensarlo", "seguimiento"]),
    ("mas adelante", &["pensarlo", "seguimiento"]),
    ("despues", &["pensarlo"]),
    ("ya tengo", &["competencia"]),
    ("ya uso", &["competencia"]),
    ("otro proveedor", &["competencia"]),
    ("socio", &["autoridad"]),
    ("jefe", &["autoridad"]),
    ("consultarlo", &["autoridad"]),
    ("estafa", &["confianza"]),
    ("funciona", &["confianza", "producto"]),
    ("garantia", &["confianza"]),
    ("demo", &["demo"]),
    ("llamada", &["demo"]),
    ("agendar", &["demo"]),
    ("hola", &["saludo"]),
    ("buenas", &["saludo"]),
    ("anuncio", &["saludo", "anuncio"]),
    ("link de pago", &["cierre", "pago"]),
    ("pagar", &["cierre", "pago"]),
    ("contratar", &["cierre"]),
    ("humano", &["humano"]),
    ("asesor", &["humano"]),
    ("restaurante", &["restaurante"]),
    ("pedidos", &["restaurante", "pedidos"]),
    ("clinica", &["salud"]),
    ("pacientes", &["salud"]),
    ("citas", &["citas"]),
    ("tienda", &["comercio"]),
    ("inmobiliaria", &["inmobiliaria"]),
    ("ocupado", &["ocupado"]),
    ("rapido", &["ocupado"]),
];

/// Maps observed keywords onto canonical tags.
#[derive(Debug, Clone)]
pub struct TagDetector {
    table: Vec<(String, Vec<String>)>,
}

impl Default for TagDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TagDetector {
    pub fn new() -> Self {
        Self::with_table(TAG_TABLE)
    }

    pub fn with_table(table: &[(&str, &[&str])]) -> Self {
        Self {
            table: table
                .iter()
                .map(|(keyword, tags)| {
                    (
                        normalize_phrase(keyword),
                        tags.iter().map(|t| t.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Tags for the current message plus the last [`TAG_LOOKBACK`] user messages.
    pub fn detect_tags(&self, message: &str, recent_user_texts: &[&str]) -> BTreeSet<String> {
        let skip = recent_user_texts.len().saturating_sub(TAG_LOOKBACK);
        let mut texts = vec![NormalizedText::new(message)];
        texts.extend(
            recent_user_texts
                .iter()
                .skip(skip)
                .map(|t| NormalizedText::new(t)),
        );

        let mut tags = BTreeSet::new();
        for (keyword, implied) in &self.table {
            if texts.iter().any(|t| t.contains_phrase(keyword)) {
                tags.extend(implied.iter().cloned());
            }
        }
        tags
    }
}

/// Rank `library` by tag overlap and keep the best `max_n`.
///
/// Records with no overlap are dropped. Ties keep library order.
pub fn select_examples<'a>(
    tags: &BTreeSet<String>,
    library: &'a [ExampleRecord],
    max_n: usize,
) -> Vec<&'a ExampleRecord> {
    let mut scored: Vec<(usize, &ExampleRecord)> = library
        .iter()
        .map(|record| (record.overlap(tags), record))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(max_n);
    scored.into_iter().map(|(_, record)| record).collect()
}

/// Render selected examples as a prompt section body. Empty input renders nothing.
pub fn render_examples(examples: &[&ExampleRecord]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            format!(
                "Ejemplo {} ({})\nSituación: {}\n{}\nPor qué funcionó: {}",
                i + 1,
                ex.id,
                ex.context,
                ex.transcript.trim(),
                ex.why_it_worked
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// An immutable set of worked examples.
#[derive(Debug, Clone, Default)]
pub struct ExampleLibrary {
    records: Vec<ExampleRecord>,
}

impl ExampleLibrary {
    pub fn from_records(records: Vec<ExampleRecord>) -> Self {
        Self { records }
    }

    /// Load a library from a JSON array of records.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let records: Vec<ExampleRecord> = serde_json::from_str(&raw)?;
        if let Some(bad) = records.iter().find(|r| r.id.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "Example record without id (context: {:?})",
                bad.context
            )));
        }
        Ok(Self::from_records(records))
    }

    pub fn records(&self) -> &[ExampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Built-in sales examples.
    pub fn builtin() -> Self {
        let record = |id: &str, tags: &[&str], context: &str, transcript: &str, why: &str| {
            ExampleRecord {
                id: id.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                context: context.to_string(),
                transcript: transcript.to_string(),
                why_it_worked: why.to_string(),
            }
        };

        Self::from_records(vec![
            record(
                "precio-caro-restaurante",
                &["caro", "precio", "restaurante"],
                "Dueño de restaurante dice que está caro.",
                "Cliente: Está muy caro\nAsistente: Te entiendo. ¿Cuántos pedidos se te escapan a la semana por no contestar a tiempo? Con dos pedidos al mes el plan ya se paga solo.",
                "Valida la preocupación y lleva la conversación al costo de no tener la solución, con una sola pregunta.",
            ),
            record(
                "precio-directo",
                &["precio"],
                "Pregunta de precio sin contexto del negocio.",
                "Cliente: ¿Cuánto cuesta?\nAsistente: Tenemos planes desde $499 al mes. Para recomendarte el correcto, ¿qué tipo de negocio tienes?",
                "Responde el precio sin rodeos y aprovecha para descubrir el giro.",
            ),
            record(
                "pensarlo-seguimiento",
                &["pensarlo", "seguimiento"],
                "El prospecto quiere pensarlo.",
                "Cliente: Déjame lo pienso\nAsistente: Claro, tómate tu tiempo. ¿Te parece si te escribo el jueves para resolver cualquier duda que te quede?",
                "Respeta la decisión y asegura un seguimiento con fecha concreta.",
            ),
            record(
                "competencia-bot",
                &["competencia"],
                "Ya usa otra herramienta de mensajería.",
                "Cliente: Ya tengo un bot\nAsistente: ¡Qué bien que ya automatizas! ¿Qué es lo que más te gustaría que tu bot actual hiciera mejor?",
                "No ataca al competidor; busca la brecha que el prospecto ya siente.",
            ),
            record(
                "autoridad-socio",
                &["autoridad"],
                "Necesita consultarlo con su socio.",
                "Cliente: Lo tengo que ver con mi socio\nAsistente: Perfecto. ¿Quieres que te mande un resumen de dos líneas para compartírselo, o prefieren verlo juntos en una demo de 15 minutos?",
                "Facilita la conversación interna y ofrece incluir a quien decide.",
            ),
            record(
                "saludo-anuncio",
                &["saludo", "anuncio"],
                "Primer mensaje desde un anuncio.",
                "Cliente: Hola, vi su anuncio\nAsistente: ¡Hola! Qué gusto que nos escribas. ¿Qué tipo de negocio tienes?",
                "Saludo breve y una sola pregunta de descubrimiento.",
            ),
            record(
                "confianza-demo",
                &["confianza", "demo"],
                "Duda si de verdad funciona.",
                "Cliente: ¿De verdad funciona?\nAsistente: Es justa la duda. Una clínica como la tuya redujo sus inasistencias a la mitad. ¿Te muestro cómo en una demo en vivo?",
                "Prueba social concreta y una invitación sin compromiso.",
            ),
            record(
                "cierre-pago",
                &["cierre", "pago"],
                "El prospecto está listo para pagar.",
                "Cliente: Va, ¿cómo pago?\nAsistente: ¡Excelente decisión! ¿A qué correo te envío el link de pago?",
                "No vuelve a vender; solo pide el dato faltante para cerrar.",
            ),
        ])
    }
}
