//! Signal Analyzer - runs every detector over one message.
//!
//! Detectors are pure and share no mutable state, so one analyzer instance can serve any number
//! of concurrent turns.

use chrono::Utc;
use std::time::Instant;
use tracing::debug;

use super::context_packet::ContextPacket;
use super::few_shot::TagDetector;
use super::industry::IndustryDetector;
use super::intent::IntentClassifier;
use super::lexicon::SignalDetector;
use super::objection::ObjectionDetector;
use super::sentiment::SentimentDetector;

/// Main analyzer that owns all detector tables
pub struct SignalAnalyzer {
    sentiment: SentimentDetector,
    industry: IndustryDetector,
    objection: ObjectionDetector,
    intent: IntentClassifier,
    tags: TagDetector,
}

impl Default for SignalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalAnalyzer {
    /// Create an analyzer with the default tables
    pub fn new() -> Self {
        Self {
            sentiment: SentimentDetector::new(),
            industry: IndustryDetector::new(),
            objection: ObjectionDetector::new(),
            intent: IntentClassifier::new(),
            tags: TagDetector::new(),
        }
    }

    pub fn objection_detector(&self) -> &ObjectionDetector {
        &self.objection
    }

    /// Analyze a message against the recent user messages (oldest first)
    pub fn analyze(
        &self,
        message: &str,
        recent_user_texts: &[&str],
        industry_hint: Option<&str>,
    ) -> ContextPacket {
        let start = Instant::now();

        let mut packet = ContextPacket::new(message.to_string());
        packet.sentiment = self.sentiment.detect(message, recent_user_texts);
        packet.industry = self
            .industry
            .detect_with_hint(message, recent_user_texts, industry_hint);
        packet.objection = self.objection.detect(message, recent_user_texts);
        packet.intent = self.intent.detect(message, recent_user_texts);
        packet.tags = self.tags.detect_tags(message, recent_user_texts);

        packet.processing_time_ms = start.elapsed().as_millis() as u64;
        packet.timestamp = Utc::now();

        debug!(
            sentiment_signals = ?packet.sentiment.signals,
            objection_signals = ?packet.objection.signals,
            "Signal analysis complete"
        );
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::industry::Industry;
    use crate::brain::intent::Intent;
    use crate::brain::objection::ObjectionKind;
    use crate::brain::sentiment::Sentiment;

    #[test]
    fn test_greeting_analysis() {
        let analyzer = SignalAnalyzer::new();

        let packet = analyzer.analyze("Hola, vi su anuncio", &[], None);
        assert_eq!(packet.intent.label, Intent::Greeting);
        assert_eq!(packet.objection.label, ObjectionKind::None);
        assert_eq!(packet.industry.label, Industry::General);
        assert!(packet.tags.contains("saludo"));
    }

    #[test]
    fn test_price_objection_analysis() {
        let analyzer = SignalAnalyzer::new();

        let packet = analyzer.analyze("Está muy caro para mí ahorita", &[], None);
        assert_eq!(packet.sentiment.label, Sentiment::PriceSensitive);
        assert_eq!(packet.objection.label, ObjectionKind::Price);
        assert!(packet.tags.contains("precio"));
    }

    #[test]
    fn test_deferral_and_domain() {
        let analyzer = SignalAnalyzer::new();

        let packet = analyzer.analyze(
            "Mi clínica está llena este mes, lo voy a pensar y te aviso más adelante",
            &["atiendo pacientes"],
            None,
        );
        assert!(packet.is_deferral());
        assert_eq!(packet.detected_domain().as_deref(), Some("health"));
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let analyzer = SignalAnalyzer::new();
        let history = ["hola", "tengo un restaurante"];

        let a = analyzer.analyze("¿Cuánto cuesta? Está caro", &history, None);
        let b = analyzer.analyze("¿Cuánto cuesta? Está caro", &history, None);
        assert_eq!(a.sentiment, b.sentiment);
        assert_eq!(a.industry, b.industry);
        assert_eq!(a.objection, b.objection);
        assert_eq!(a.tags, b.tags);
    }
}
