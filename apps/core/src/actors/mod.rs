//! # Actors Module
//!
//! I/O side of the pipeline: the generation-provider actor, the collaborator traits with their
//! webhook clients, and tool dispatch.

pub mod messages;
pub mod provider;
pub mod tools;
pub mod traits;
pub mod webhooks;

pub use provider::{ProviderHandle, ProviderSettings};
pub use tools::{Collaborators, DispatchReport, ToolDispatcher, ToolInvocation, ToolResult};
pub use traits::GenerationProvider;
pub use webhooks::{WebhookCollaborators, WebhookEndpoints};
