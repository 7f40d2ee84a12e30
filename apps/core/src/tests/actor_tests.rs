//! Actor System Tests
//!
//! Tool dispatch against recording collaborators.

use super::support::{collaborators, lead, RecordingCollaborators};
use crate::actors::messages::ToolCall;
use crate::actors::tools::{
    ToolDispatcher, ToolResult, ESCALATE_TO_HUMAN, SCHEDULE_DEMO, SEND_PAYMENT_LINK,
};
use crate::actors::traits::Urgency;
use crate::models::MockToolSpec;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn dispatcher() -> (ToolDispatcher, Arc<RecordingCollaborators>) {
    let recorder = Arc::new(RecordingCollaborators::default());
    (ToolDispatcher::new(collaborators(&recorder)), recorder)
}

fn stock_tool() -> MockToolSpec {
    MockToolSpec {
        name: "check_stock".to_string(),
        description: "Consulta inventario".to_string(),
        result: json!({ "available": 12 }),
    }
}

fn payment_call(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        SEND_PAYMENT_LINK,
        json!({ "email": "ana@example.com", "plan": "pro" }),
    )
}

// ============================================================================
// Tool Menu Tests
// ============================================================================

#[cfg(test)]
mod menu_tests {
    use super::*;

    #[test]
    fn test_menu_lists_builtins_then_mocks() {
        let (dispatcher, _) = dispatcher();
        let menu = dispatcher.menu(false, &[stock_tool()]);
        let names: Vec<&str> = menu.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![ESCALATE_TO_HUMAN, SCHEDULE_DEMO, SEND_PAYMENT_LINK, "check_stock"]
        );
    }

    #[test]
    fn test_active_appointment_removes_schedule_demo() {
        let (dispatcher, _) = dispatcher();
        let menu = dispatcher.menu(true, &[]);
        assert!(menu.iter().all(|t| t.name() != SCHEDULE_DEMO));
        assert_eq!(menu.len(), 2);
    }
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[tokio::test]
    async fn test_payment_link_created_and_sent_once() {
        // 1. Arrange
        let (dispatcher, recorder) = dispatcher();
        let menu = dispatcher.menu(false, &[]);

        // 2. Act
        let report = dispatcher
            .dispatch(&[payment_call("call_pay_1")], &lead(), &[], &menu)
            .await;

        // 3. Assert
        assert_eq!(recorder.session_count(), 1);
        assert_eq!(recorder.text_count(), 1);
        assert_eq!(
            recorder.idempotency_keys.lock().unwrap().as_slice(),
            ["call_pay_1".to_string()]
        );

        let record = report.payment_link.expect("payment record");
        assert_eq!(record.plan, "pro");
        assert_eq!(record.email, "ana@example.com");

        let (phone, text) = recorder.texts.lock().unwrap()[0].clone();
        assert_eq!(phone, lead().phone);
        assert!(text.contains(&record.url));

        assert_eq!(report.executed.len(), 1);
        assert!(report.executed[0].result.success());
    }

    #[tokio::test]
    async fn test_repeated_call_id_executes_once() {
        let (dispatcher, recorder) = dispatcher();
        let menu = dispatcher.menu(false, &[]);
        let calls = vec![payment_call("call_dup"), payment_call("call_dup")];

        let report = dispatcher.dispatch(&calls, &lead(), &[], &menu).await;

        assert_eq!(recorder.checkout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.text_count(), 1);
        assert_eq!(report.executed.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_not_offered_is_rejected() {
        let (dispatcher, recorder) = dispatcher();
        let menu = dispatcher.menu(true, &[]);
        let call = ToolCall::new("call_1", SCHEDULE_DEMO, json!({ "email": "ana@example.com" }));

        let report = dispatcher.dispatch(&[call], &lead(), &[], &menu).await;

        assert_eq!(recorder.booking_count(), 0);
        assert!(matches!(
            report.executed[0].result,
            ToolResult::Rejected { success: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_arguments_have_no_side_effects() {
        let (dispatcher, recorder) = dispatcher();
        let menu = dispatcher.menu(false, &[]);
        let call = ToolCall::new("call_1", SEND_PAYMENT_LINK, json!({ "plan": "pro" }));

        let report = dispatcher.dispatch(&[call], &lead(), &[], &menu).await;

        assert_eq!(recorder.checkout_calls.load(Ordering::SeqCst), 0);
        assert!(report.payment_link.is_none());
        assert!(!report.executed[0].result.success());
    }

    #[tokio::test]
    async fn test_notification_failure_reports_link_without_record() {
        let recorder = Arc::new(RecordingCollaborators {
            fail_notifications: true,
            ..Default::default()
        });
        let dispatcher = ToolDispatcher::new(collaborators(&recorder));
        let menu = dispatcher.menu(false, &[]);

        let report = dispatcher
            .dispatch(&[payment_call("call_pay_1")], &lead(), &[], &menu)
            .await;

        assert!(report.payment_link.is_none());
        match &report.executed[0].result {
            ToolResult::SendPaymentLink {
                success,
                checkout_url,
                ..
            } => {
                assert!(!success);
                assert!(checkout_url.is_some());
            }
            other => panic!("Expected payment result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_escalation_reaches_operator() {
        let (dispatcher, recorder) = dispatcher();
        let menu = dispatcher.menu(false, &[]);
        let call = ToolCall::new(
            "call_esc",
            ESCALATE_TO_HUMAN,
            json!({
                "reason": "Pidió hablar con un humano",
                "summary": "Restaurante, quiere precio de plan pro",
                "urgency": "high",
                "is_vip": true
            }),
        );

        let report = dispatcher.dispatch(&[call], &lead(), &[], &menu).await;

        let escalation = report.escalation.expect("escalation record");
        assert_eq!(escalation.reason, "Pidió hablar con un humano");

        let handoffs = recorder.handoffs.lock().unwrap();
        assert_eq!(handoffs.len(), 1);
        assert_eq!(handoffs[0].urgency, Urgency::High);
        assert!(handoffs[0].is_vip);
        assert_eq!(handoffs[0].lead_name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_failed_handoff_is_reported_not_recorded() {
        let recorder = Arc::new(RecordingCollaborators {
            fail_handoff: true,
            ..Default::default()
        });
        let dispatcher = ToolDispatcher::new(collaborators(&recorder));
        let menu = dispatcher.menu(false, &[]);
        let call = ToolCall::new(
            "call_esc",
            ESCALATE_TO_HUMAN,
            json!({ "reason": "queja", "summary": "Cliente molesto" }),
        );

        let report = dispatcher.dispatch(&[call], &lead(), &[], &menu).await;

        assert!(report.escalation.is_none());
        assert!(!report.executed[0].result.success());
    }

    #[tokio::test]
    async fn test_schedule_demo_falls_back_to_lead_name() {
        let (dispatcher, recorder) = dispatcher();
        let menu = dispatcher.menu(false, &[]);
        let call = ToolCall::new("call_1", SCHEDULE_DEMO, json!({ "email": "ana@example.com" }));

        let report = dispatcher.dispatch(&[call], &lead(), &[], &menu).await;

        assert_eq!(
            recorder.bookings.lock().unwrap()[0],
            ("ana@example.com".to_string(), "Ana".to_string())
        );
        match &report.executed[0].result {
            ToolResult::ScheduleDemo { booking_link, .. } => assert!(booking_link.is_some()),
            other => panic!("Expected booking result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_tool_returns_fixed_result() {
        let (dispatcher, _) = dispatcher();
        let mocks = vec![stock_tool()];
        let menu = dispatcher.menu(false, &mocks);
        let call = ToolCall::new("call_1", "check_stock", json!({}));

        let report = dispatcher.dispatch(&[call], &lead(), &mocks, &menu).await;

        match &report.executed[0].result {
            ToolResult::Mock { name, result, .. } => {
                assert_eq!(name, "check_stock");
                assert_eq!(result["available"], 12);
            }
            other => panic!("Expected mock result, got {:?}", other),
        }
        assert!(report.payment_link.is_none());
        assert!(report.escalation.is_none());
    }
}
