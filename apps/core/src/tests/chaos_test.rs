//! Resilience tests: every failure path still ends in a usable reply.

use super::support::{collaborators, context, text, tool_calls, RecordingCollaborators, ScriptedProvider};
use crate::actors::messages::{AppError, Completion, ToolCall};
use crate::actors::tools::SEND_PAYMENT_LINK;
use crate::orchestrator::{Orchestrator, FALLBACK_REPLY};
use serde_json::json;
use std::sync::Arc;

// --- Helpers ---

fn build(provider: &Arc<ScriptedProvider>, recorder: &Arc<RecordingCollaborators>) -> Orchestrator {
    Orchestrator::new(provider.clone(), collaborators(recorder))
}

const COMPLEX_MESSAGE: &str = "Está muy caro, ya tengo otro proveedor y no sé si me conviene cambiar";

#[tokio::test]
async fn test_strategy_failure_is_absorbed() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![Ok(text("Entiendo. ¿Qué es lo que más te gustaría mejorar?"))])
            .with_structured(Err(AppError::Timeout("reasoning model".to_string()))),
    );
    let recorder = Arc::new(RecordingCollaborators::default());

    let result = build(&provider, &recorder)
        .run(COMPLEX_MESSAGE, &context(vec![]), None)
        .await;

    assert_eq!(provider.structured_count(), 1);
    assert!(!result.reply.is_empty());
    assert_ne!(result.reply, FALLBACK_REPLY);
    assert!(!provider.request(0).system.contains("## ESTRATEGIA"));
}

#[tokio::test]
async fn test_malformed_assessment_is_absorbed() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![])
            .with_structured(Ok(json!({ "phase": "negotiating", "directive": "" }))),
    );
    let recorder = Arc::new(RecordingCollaborators::default());

    let result = build(&provider, &recorder)
        .run(COMPLEX_MESSAGE, &context(vec![]), None)
        .await;

    assert!(!result.reply.is_empty());
    assert!(!provider.request(0).system.contains("Fase actual"));
}

#[tokio::test]
async fn test_generation_failure_returns_fallback() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(AppError::Provider(
        "Completion request failed with status 503".to_string(),
    ))]));
    let recorder = Arc::new(RecordingCollaborators::default());
    let mut ctx = context(vec![]);
    ctx.lead.industry = Some("restaurante".to_string());

    let result = build(&provider, &recorder).run("Hola", &ctx, None).await;

    assert_eq!(result.reply, FALLBACK_REPLY);
    assert_eq!(result.tokens_used, None);
    assert_eq!(result.detected_domain.as_deref(), Some("restaurant"));
    assert!(result.payment_link_sent.is_none());
}

#[tokio::test]
async fn test_empty_generation_returns_fallback() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(Completion::default())]));
    let recorder = Arc::new(RecordingCollaborators::default());

    let result = build(&provider, &recorder).run("Hola", &context(vec![]), None).await;

    assert_eq!(result.reply, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_follow_up_failure_keeps_tool_effects() {
    let mut first = tool_calls(vec![ToolCall::new(
        "call_pay_1",
        SEND_PAYMENT_LINK,
        json!({ "email": "ana@example.com", "plan": "basico" }),
    )]);
    first.content = Some("Va, te genero el link.".to_string());
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(first),
        Err(AppError::Provider("connection reset".to_string())),
    ]));
    let recorder = Arc::new(RecordingCollaborators::default());

    let result = build(&provider, &recorder)
        .run("Lo quiero, ana@example.com", &context(vec![]), None)
        .await;

    assert_eq!(result.reply, "Va, te genero el link.");
    assert!(result.payment_link_sent.is_some());
    assert_eq!(recorder.session_count(), 1);
}

#[tokio::test]
async fn test_failed_notification_is_not_reported_as_sent() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(tool_calls(vec![ToolCall::new(
            "call_pay_1",
            SEND_PAYMENT_LINK,
            json!({ "email": "ana@example.com", "plan": "pro" }),
        )])),
        Ok(text("Aquí está tu link: https://pay.example.com/pro/cs_1")),
    ]));
    let recorder = Arc::new(RecordingCollaborators {
        fail_notifications: true,
        ..Default::default()
    });

    let result = build(&provider, &recorder)
        .run("Lo quiero, ana@example.com", &context(vec![]), None)
        .await;

    assert!(result.payment_link_sent.is_none());
    assert!(!result.reply.is_empty());
    let tool_message = provider.request(1).messages.last().cloned().expect("tool message");
    assert!(tool_message.content.unwrap_or_default().contains("\"success\":false"));
}

#[tokio::test]
async fn test_hallucinated_tool_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(tool_calls(vec![ToolCall::new("call_x", "refund_customer", json!({}))])),
        Ok(text("No puedo hacer reembolsos, pero te paso con un asesor.")),
    ]));
    let recorder = Arc::new(RecordingCollaborators::default());

    let result = build(&provider, &recorder).run("Quiero un reembolso", &context(vec![]), None).await;

    assert_eq!(result.reply, "No puedo hacer reembolsos, pero te paso con un asesor.");
    assert!(result.escalation.is_none());
    assert_eq!(recorder.handoff_count(), 0);
}
