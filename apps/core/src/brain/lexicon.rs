//! Weighted lexical matcher shared by every signal detector.
//!
//! A [`WeightedLexicon`] owns a table of labels, each with keyword phrases and precompiled
//! patterns. Scoring is additive: every keyword hit and every pattern hit in the current message
//! adds its weight, keyword hits in recent history add a smaller, capped increment. All detectors
//! go through the same code so scoring semantics cannot drift between them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lowercase, strip Spanish/French accents, keep punctuation.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Text prepared once for both keyword and pattern matching.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    /// Folded text with punctuation, used by patterns.
    pub folded: String,
    /// Space-padded token stream, used by keyword phrases.
    padded: String,
    tokens: Vec<String>,
}

impl NormalizedText {
    pub fn new(text: &str) -> Self {
        let folded = fold(text);
        let tokens: Vec<String> = folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let padded = format!(" {} ", tokens.join(" "));
        Self {
            folded,
            padded,
            tokens,
        }
    }

    /// Whole-word (or whole-phrase) containment. `phrase` must already be normalized.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        !phrase.trim().is_empty() && self.padded.contains(phrase)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn question_marks(&self) -> usize {
        self.folded.matches('?').count()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Turn a keyword into the padded form [`NormalizedText::contains_phrase`] expects.
pub fn normalize_phrase(phrase: &str) -> String {
    NormalizedText::new(phrase).padded
}

/// Weights and thresholds for one detector. Each detector keeps its own tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub keyword: f32,
    pub pattern: f32,
    /// Added per keyword hit found in history.
    pub history: f32,
    /// Upper bound of the total history contribution for one label.
    pub history_cap: f32,
    /// Score that maps to confidence 1.0.
    pub saturation: f32,
    /// Below this confidence the detector reports its neutral label.
    pub min_confidence: f32,
}

/// One row of a lexicon table.
#[derive(Debug, Clone)]
pub struct LexiconEntry<L> {
    pub label: L,
    keywords: Vec<(String, String)>,
    patterns: Vec<Regex>,
    pub guidance: String,
}

impl<L> LexiconEntry<L> {
    pub fn new(label: L, keywords: &[&str], patterns: Vec<Regex>, guidance: &str) -> Self {
        Self {
            label,
            keywords: keywords
                .iter()
                .map(|k| (k.to_string(), normalize_phrase(k)))
                .collect(),
            patterns,
            guidance: guidance.to_string(),
        }
    }

    /// Keywords as written in the table.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(raw, _)| raw.as_str())
    }

    fn keyword_hits<'a>(&'a self, text: &'a NormalizedText) -> impl Iterator<Item = &'a str> + 'a {
        self.keywords
            .iter()
            .filter(move |(_, normalized)| text.contains_phrase(normalized))
            .map(|(raw, _)| raw.as_str())
    }
}

/// Aggregate score of one label against one message plus history.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore<L> {
    pub label: L,
    pub score: f32,
    /// Distinct keyword matches in the current message.
    pub keyword_hits: usize,
    /// Distinct keyword matches across history.
    pub history_hits: usize,
    /// Different keywords matched anywhere; a keyword repeated across messages counts once.
    pub distinct_keywords: usize,
    /// Human-readable evidence, current-message hits first.
    pub evidence: Vec<String>,
}

/// A table of labels scored with one set of weights.
#[derive(Debug, Clone)]
pub struct WeightedLexicon<L> {
    entries: Vec<LexiconEntry<L>>,
    weights: ScoringWeights,
}

impl<L: Copy + PartialEq> WeightedLexicon<L> {
    pub fn new(entries: Vec<LexiconEntry<L>>, weights: ScoringWeights) -> Self {
        Self { entries, weights }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn entries(&self) -> &[LexiconEntry<L>] {
        &self.entries
    }

    pub fn guidance(&self, label: L) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.guidance.as_str())
    }

    /// Score a single entry.
    pub fn score_entry(
        &self,
        entry: &LexiconEntry<L>,
        current: &NormalizedText,
        history: &[NormalizedText],
    ) -> LabelScore<L> {
        let mut evidence = Vec::new();
        let mut score = 0.0;
        let mut distinct = BTreeSet::new();

        let mut keyword_hits = 0;
        for keyword in entry.keyword_hits(current) {
            keyword_hits += 1;
            distinct.insert(keyword);
            score += self.weights.keyword;
            evidence.push(format!("keyword:{}", keyword));
        }

        for pattern in &entry.patterns {
            if let Some(m) = pattern.find(&current.folded) {
                score += self.weights.pattern;
                evidence.push(format!("pattern:{}", m.as_str().trim()));
            }
        }

        let mut history_hits = 0;
        let mut history_score: f32 = 0.0;
        for past in history {
            for keyword in entry.keyword_hits(past) {
                history_hits += 1;
                distinct.insert(keyword);
                history_score += self.weights.history;
                evidence.push(format!("history:{}", keyword));
            }
        }
        score += history_score.min(self.weights.history_cap);

        LabelScore {
            label: entry.label,
            score,
            keyword_hits,
            history_hits,
            distinct_keywords: distinct.len(),
            evidence,
        }
    }

    /// Score every entry in table order.
    pub fn score_all(&self, current: &NormalizedText, history: &[NormalizedText]) -> Vec<LabelScore<L>> {
        self.entries
            .iter()
            .map(|entry| self.score_entry(entry, current, history))
            .collect()
    }

    /// Highest score wins; ties keep the earlier table row.
    pub fn best(scores: Vec<LabelScore<L>>) -> Option<LabelScore<L>> {
        scores.into_iter().fold(None, |best, candidate| match best {
            Some(b) if b.score >= candidate.score => Some(b),
            _ if candidate.score > 0.0 => Some(candidate),
            other => other,
        })
    }

    /// Map a raw score onto [0, 1].
    pub fn confidence(&self, score: f32) -> f32 {
        if self.weights.saturation <= 0.0 {
            return 0.0;
        }
        (score / self.weights.saturation).clamp(0.0, 1.0)
    }

    /// Resolve scores into a [`SignalResult`], collapsing to `neutral` below the floor.
    pub fn resolve(&self, best: Option<LabelScore<L>>, neutral: L, neutral_guidance: &str) -> SignalResult<L> {
        match best {
            Some(winner) => {
                let confidence = self.confidence(winner.score);
                if confidence < self.weights.min_confidence {
                    return SignalResult::neutral(neutral, confidence, neutral_guidance);
                }
                SignalResult {
                    label: winner.label,
                    confidence,
                    guidance: self
                        .guidance(winner.label)
                        .unwrap_or(neutral_guidance)
                        .to_string(),
                    signals: winner.evidence,
                }
            }
            None => SignalResult::neutral(neutral, 0.0, neutral_guidance),
        }
    }
}

/// Labeled classification produced by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult<L> {
    pub label: L,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Matched evidence in the order it was found
    pub signals: Vec<String>,
    pub guidance: String,
}

impl<L> SignalResult<L> {
    pub fn neutral(label: L, confidence: f32, guidance: &str) -> Self {
        Self {
            label,
            confidence,
            signals: Vec::new(),
            guidance: guidance.to_string(),
        }
    }
}

/// Contract shared by all detectors: pure, deterministic, no retained state.
pub trait SignalDetector: Send + Sync {
    type Label: Copy + PartialEq;

    fn detect(&self, current: &str, history: &[&str]) -> SignalResult<Self::Label>;
}

/// Normalize the most recent `limit` history entries.
pub fn normalize_history(history: &[&str], limit: usize) -> Vec<NormalizedText> {
    let skip = history.len().saturating_sub(limit);
    history
        .iter()
        .skip(skip)
        .map(|h| NormalizedText::new(h))
        .collect()
}

/// Compile a built-in pattern. Tables are static source text, so a failure is a programming error.
pub fn pattern(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|e| panic!("Invalid built-in pattern {:?}: {}", source, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        None,
        Red,
        Blue,
    }

    fn weights() -> ScoringWeights {
        ScoringWeights {
            keyword: 0.4,
            pattern: 0.5,
            history: 0.1,
            history_cap: 0.2,
            saturation: 1.0,
            min_confidence: 0.3,
        }
    }

    fn lexicon() -> WeightedLexicon<Color> {
        WeightedLexicon::new(
            vec![
                LexiconEntry::new(Color::Red, &["rojo", "carmesí"], vec![pattern(r"\bmuy rojo\b")], "red"),
                LexiconEntry::new(Color::Blue, &["azul", "cielo"], vec![], "blue"),
            ],
            weights(),
        )
    }

    #[test]
    fn test_fold_strips_accents() {
        assert_eq!(fold("Está CARÍSIMO, ñoño"), "esta carisimo, nono");
    }

    #[test]
    fn test_phrase_matching_is_word_bounded() {
        let text = NormalizedText::new("Mi carro es rojo");
        assert!(text.contains_phrase(&normalize_phrase("rojo")));
        assert!(!text.contains_phrase(&normalize_phrase("car")));
        assert!(text.contains_phrase(&normalize_phrase("es rojo")));
    }

    #[test]
    fn test_accented_keyword_matches_plain_text() {
        let lex = lexicon();
        let scores = lex.score_all(&NormalizedText::new("color carmesi"), &[]);
        assert_eq!(scores[0].keyword_hits, 1);
    }

    #[test]
    fn test_history_contribution_is_capped() {
        let lex = lexicon();
        let history: Vec<NormalizedText> = ["azul", "azul cielo", "cielo azul", "azul"]
            .iter()
            .map(|h| NormalizedText::new(h))
            .collect();
        let scores = lex.score_all(&NormalizedText::new("hola"), &history);
        let blue = &scores[1];
        assert_eq!(blue.history_hits, 6);
        assert!((blue.score - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_best_prefers_earlier_row_on_tie() {
        let lex = lexicon();
        let scores = lex.score_all(&NormalizedText::new("rojo azul"), &[]);
        let best = WeightedLexicon::best(scores).unwrap();
        assert_eq!(best.label, Color::Red);
    }

    #[test]
    fn test_resolve_collapses_below_floor() {
        let lex = lexicon();
        let history = vec![NormalizedText::new("azul")];
        let best = WeightedLexicon::best(lex.score_all(&NormalizedText::new("nada"), &history));
        let result = lex.resolve(best, Color::None, "none");
        assert_eq!(result.label, Color::None);
        assert!(result.signals.is_empty());
    }

    #[test]
    fn test_score_is_monotonic_in_matches() {
        let lex = lexicon();
        let base = lex.score_all(&NormalizedText::new("es rojo"), &[])[0].score;
        let more = lex.score_all(&NormalizedText::new("es rojo carmesi"), &[])[0].score;
        let most = lex.score_all(&NormalizedText::new("es muy rojo carmesi"), &[])[0].score;
        assert!(more >= base);
        assert!(most >= more);
    }
}
