//! Prompt composer.
//!
//! Pure string assembly. Sections are appended in a fixed order, most specific last, and a
//! section whose body is empty is left out entirely (no dangling header).

/// Closing format constraint appended to every prompt.
pub const FORMAT_RULES: &str = "Responde en máximo 3 oraciones cortas, con tono de WhatsApp, \
sin listas ni formato markdown, y con máximo UNA pregunta. No repitas preguntas ya hechas.";

/// Inputs of one composition. Everything but the persona and the state directive is optional.
#[derive(Debug, Clone, Default)]
pub struct PromptSections {
    pub persona: String,
    pub domain: Option<String>,
    pub memory: Option<String>,
    pub knowledge: Option<String>,
    pub examples: Option<String>,
    pub strategy: Option<String>,
    pub tone: Option<String>,
    pub state_directive: String,
}

fn push_section(out: &mut Vec<String>, title: &str, body: Option<&str>) {
    if let Some(body) = body.map(str::trim).filter(|b| !b.is_empty()) {
        out.push(format!("## {}\n{}", title, body));
    }
}

/// Assemble the instruction text.
///
/// Order: persona, domain, memory, knowledge, examples, strategy, tone, state directive, format.
pub fn compose(sections: &PromptSections) -> String {
    let mut out = Vec::with_capacity(9);

    let persona = sections.persona.trim();
    if !persona.is_empty() {
        out.push(persona.to_string());
    }
    push_section(&mut out, "CONTEXTO DEL GIRO", sections.domain.as_deref());
    push_section(&mut out, "MEMORIA DEL PROSPECTO", sections.memory.as_deref());
    push_section(&mut out, "INFORMACIÓN DEL NEGOCIO", sections.knowledge.as_deref());
    push_section(&mut out, "EJEMPLOS DE CONVERSACIONES EXITOSAS", sections.examples.as_deref());
    push_section(&mut out, "ESTRATEGIA", sections.strategy.as_deref());
    push_section(&mut out, "TONO", sections.tone.as_deref());
    push_section(&mut out, "INSTRUCCIÓN PARA ESTE MENSAJE", Some(sections.state_directive.as_str()));
    push_section(&mut out, "FORMATO", Some(FORMAT_RULES));

    out.join("\n\n")
}

/// Tone section body from sentiment and objection guidance.
pub fn tone_section(
    sentiment_label: &str,
    sentiment_guidance: &str,
    objection_name: Option<&str>,
    objection_guidance: &str,
) -> Option<String> {
    let mut lines = Vec::new();
    if !sentiment_guidance.trim().is_empty() {
        lines.push(format!("Tono detectado: {}. {}", sentiment_label, sentiment_guidance.trim()));
    }
    if let Some(name) = objection_name {
        lines.push(format!("Objeción detectada: {}", name));
        if !objection_guidance.trim().is_empty() {
            lines.push(objection_guidance.trim().to_string());
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}
