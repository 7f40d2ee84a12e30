//! Context Packet - Output structure for signal analysis.
//!
//! Contains all the enriched context extracted from one inbound message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::industry::Industry;
use super::intent::Intent;
use super::lexicon::SignalResult;
use super::objection::ObjectionKind;
use super::sentiment::Sentiment;

/// Complete context packet from signal analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPacket {
    /// Original user message
    pub query: String,

    /// Tone of the lead
    pub sentiment: SignalResult<Sentiment>,

    /// Business vertical
    pub industry: SignalResult<Industry>,

    /// Sales objection, if any
    pub objection: SignalResult<ObjectionKind>,

    /// What the lead is trying to do
    pub intent: SignalResult<Intent>,

    /// Tags used for few-shot retrieval
    pub tags: BTreeSet<String>,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,

    /// Timestamp of analysis
    pub timestamp: DateTime<Utc>,
}

impl ContextPacket {
    /// Create a packet with every signal at its neutral label
    pub fn new(query: String) -> Self {
        Self {
            query,
            sentiment: SignalResult::neutral(Sentiment::Neutral, 0.0, ""),
            industry: SignalResult::neutral(Industry::General, 0.0, ""),
            objection: SignalResult::neutral(ObjectionKind::None, 0.0, ""),
            intent: SignalResult::neutral(Intent::Unknown, 0.0, ""),
            tags: BTreeSet::new(),
            processing_time_ms: 0,
            timestamp: Utc::now(),
        }
    }

    /// Vertical label, unless it is the general fallback
    pub fn detected_domain(&self) -> Option<String> {
        match self.industry.label {
            Industry::General => None,
            other => Some(other.label().to_string()),
        }
    }

    /// The lead postponed the decision
    pub fn is_deferral(&self) -> bool {
        self.objection.label == ObjectionKind::Timing
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Intent: {} ({:.0}%), Sentiment: {} ({:.0}%), Domain: {} ({:.0}%), Objection: {}, Tags: {}",
            self.intent.label,
            self.intent.confidence * 100.0,
            self.sentiment.label,
            self.sentiment.confidence * 100.0,
            self.industry.label,
            self.industry.confidence * 100.0,
            self.objection.label,
            self.tags.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_packet_creation() {
        let packet = ContextPacket::new("test query".to_string());

        assert_eq!(packet.query, "test query");
        assert_eq!(packet.sentiment.label, Sentiment::Neutral);
        assert_eq!(packet.detected_domain(), None);
        assert!(!packet.is_deferral());
    }

    #[test]
    fn test_summary() {
        let packet = ContextPacket::new("test".to_string());
        let summary = packet.summary();

        assert!(summary.contains("Intent:"));
        assert!(summary.contains("Sentiment:"));
        assert!(summary.contains("Domain: general"));
    }
}
