//! # Brain Module
//!
//! Classification and composition side of the pipeline. Everything here is pure except the
//! strategy analyzer, which calls the generation provider.
//!
//! ## Components
//! - `lexicon`: shared weighted lexical matcher
//! - `sentiment`, `industry`, `objection`, `intent`: signal detectors
//! - `fast_path`: gate in front of the strategy analyzer
//! - `few_shot`: example tagging and retrieval
//! - `strategy`: structured situation assessment
//! - `state`: dialogue state machine
//! - `prompt`: instruction composer
//! - `context_packet`: Output data structure
//! - `analyzer`: runs every detector over one message

pub mod analyzer;
pub mod context_packet;
pub mod fast_path;
pub mod few_shot;
pub mod industry;
pub mod intent;
pub mod lexicon;
pub mod objection;
pub mod prompt;
pub mod sentiment;
pub mod state;
pub mod strategy;

// Re-export main types for convenience
pub use analyzer::SignalAnalyzer;
pub use context_packet::ContextPacket;
pub use fast_path::{FastPathDecision, FastPathPolicy};
pub use few_shot::{select_examples, ExampleLibrary, ExampleRecord, TagDetector};
pub use industry::{Industry, IndustryDetector};
pub use intent::{Intent, IntentClassifier};
pub use lexicon::{SignalDetector, SignalResult, WeightedLexicon};
pub use objection::{ObjectionDetector, ObjectionKind};
pub use prompt::{compose, PromptSections};
pub use sentiment::{Sentiment, SentimentDetector};
pub use state::{transition, DialogueState, Directive, TurnSignal};
pub use strategy::{StrategyAnalyzer, StrategyAssessment};
