// LeadFlow Core
// Conversational decision pipeline behind a WhatsApp sales assistant.

pub mod actors;
pub mod brain;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod telemetry;

pub use config::PipelineConfig;
pub use error::AppError;
pub use models::{ConversationContext, PipelineResult, TenantConfig};
pub use orchestrator::Orchestrator;

#[cfg(test)]
mod tests;
