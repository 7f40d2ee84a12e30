//! Tool menu and dispatch.
//!
//! The provider may request any tool on the menu it was offered. Each emitted call is parsed into
//! a typed [`ToolInvocation`], executed once through the injected collaborators, and answered with
//! a [`ToolResult`] tagged by tool name.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::actors::messages::{AppError, ToolCall, ToolDefinition};
use crate::actors::traits::{
    HandoffRequest, HandoffService, NotificationService, PaymentService, SchedulingService,
    Urgency,
};
use crate::models::{EscalationRecord, Lead, MockToolSpec, PaymentLinkRecord};

pub const ESCALATE_TO_HUMAN: &str = "escalate_to_human";
pub const SCHEDULE_DEMO: &str = "schedule_demo";
pub const SEND_PAYMENT_LINK: &str = "send_payment_link";

/// Names reserved by the built-in tools. Mock tools may not reuse them.
pub const BUILTIN_TOOL_NAMES: &[&str] = &[ESCALATE_TO_HUMAN, SCHEDULE_DEMO, SEND_PAYMENT_LINK];

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct EscalateArgs {
    #[validate(length(min = 1))]
    pub reason: String,
    #[validate(length(min = 1))]
    pub summary: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub is_vip: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct ScheduleDemoArgs {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct PaymentLinkArgs {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub plan: String,
    /// Defaults to the lead's phone.
    #[serde(default)]
    pub phone: Option<String>,
}

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    EscalateToHuman(EscalateArgs),
    ScheduleDemo(ScheduleDemoArgs),
    SendPaymentLink(PaymentLinkArgs),
    Mock { name: String, result: Value },
}

fn parse_args<T>(raw: &str) -> Result<T, AppError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    let args: T = serde_json::from_str(raw)?;
    args.validate()?;
    Ok(args)
}

impl ToolInvocation {
    pub fn parse(call: &ToolCall, mock_tools: &[MockToolSpec]) -> Result<Self, AppError> {
        let raw = call.function.arguments.as_str();
        match call.function.name.as_str() {
            ESCALATE_TO_HUMAN => Ok(Self::EscalateToHuman(parse_args(raw)?)),
            SCHEDULE_DEMO => Ok(Self::ScheduleDemo(parse_args(raw)?)),
            SEND_PAYMENT_LINK => Ok(Self::SendPaymentLink(parse_args(raw)?)),
            other => mock_tools
                .iter()
                .find(|spec| spec.name == other)
                .map(|spec| Self::Mock {
                    name: spec.name.clone(),
                    result: spec.result.clone(),
                })
                .ok_or_else(|| AppError::Tool(format!("Unknown tool: {}", other))),
        }
    }
}

/// Outcome of one tool call, visible to the generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "toolName", rename_all = "snake_case")]
pub enum ToolResult {
    EscalateToHuman {
        success: bool,
        message: String,
    },
    ScheduleDemo {
        success: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        booking_link: Option<String>,
    },
    SendPaymentLink {
        success: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        checkout_url: Option<String>,
    },
    Mock {
        name: String,
        success: bool,
        message: String,
        result: Value,
    },
    /// The call was not on the menu or its arguments were invalid. Nothing was executed.
    Rejected {
        name: String,
        success: bool,
        message: String,
    },
}

impl ToolResult {
    fn rejected(name: &str, message: impl Into<String>) -> Self {
        Self::Rejected {
            name: name.to_string(),
            success: false,
            message: message.into(),
        }
    }

    pub fn success(&self) -> bool {
        match self {
            Self::EscalateToHuman { success, .. }
            | Self::ScheduleDemo { success, .. }
            | Self::SendPaymentLink { success, .. }
            | Self::Mock { success, .. }
            | Self::Rejected { success, .. } => *success,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::EscalateToHuman { message, .. }
            | Self::ScheduleDemo { message, .. }
            | Self::SendPaymentLink { message, .. }
            | Self::Mock { message, .. }
            | Self::Rejected { message, .. } => message,
        }
    }

    /// JSON text returned to the provider as the tool message.
    pub fn content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message().to_string())
    }
}

/// The external services a turn may act through.
#[derive(Clone)]
pub struct Collaborators {
    pub scheduling: Arc<dyn SchedulingService>,
    pub payments: Arc<dyn PaymentService>,
    pub notifications: Arc<dyn NotificationService>,
    pub handoff: Arc<dyn HandoffService>,
}

impl Collaborators {
    /// One value serving every capability.
    pub fn shared<T>(service: Arc<T>) -> Self
    where
        T: SchedulingService + PaymentService + NotificationService + HandoffService,
    {
        Self {
            scheduling: service.clone(),
            payments: service.clone(),
            notifications: service.clone(),
            handoff: service,
        }
    }
}

/// A result paired with the provider call id it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTool {
    pub call_id: String,
    pub result: ToolResult,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub executed: Vec<ExecutedTool>,
    pub escalation: Option<EscalationRecord>,
    pub payment_link: Option<PaymentLinkRecord>,
}

fn escalate_definition() -> ToolDefinition {
    ToolDefinition::function(
        ESCALATE_TO_HUMAN,
        "Transfiere la conversación a un asesor humano. Úsala cuando el prospecto lo pida, esté muy molesto o la situación salga de tu alcance.",
        json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "Motivo de la transferencia" },
                "summary": { "type": "string", "description": "Resumen de la conversación para el asesor" },
                "urgency": { "type": "string", "enum": ["low", "medium", "high"] },
                "is_vip": { "type": "boolean" }
            },
            "required": ["reason", "summary"]
        }),
    )
}

fn schedule_definition() -> ToolDefinition {
    ToolDefinition::function(
        SCHEDULE_DEMO,
        "Genera un link para agendar una demo. Úsala cuando el prospecto acepte una demo y ya tengas su email.",
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string" },
                "name": { "type": "string" }
            },
            "required": ["email"]
        }),
    )
}

fn payment_definition() -> ToolDefinition {
    ToolDefinition::function(
        SEND_PAYMENT_LINK,
        "Crea un link de pago y lo envía al prospecto. Úsala solo cuando confirme que quiere contratar y tengas su email.",
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string" },
                "plan": { "type": "string", "description": "Identificador del plan" },
                "phone": { "type": "string" }
            },
            "required": ["email", "plan"]
        }),
    )
}

/// Executes tool calls through the collaborators.
pub struct ToolDispatcher {
    collaborators: Collaborators,
}

impl ToolDispatcher {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Tools offered for one turn. An active appointment removes `schedule_demo`.
    pub fn menu(&self, has_active_appointment: bool, mock_tools: &[MockToolSpec]) -> Vec<ToolDefinition> {
        let mut tools = vec![escalate_definition()];
        if !has_active_appointment {
            tools.push(schedule_definition());
        }
        tools.push(payment_definition());
        tools.extend(mock_tools.iter().map(|spec| {
            ToolDefinition::function(
                spec.name.clone(),
                spec.description.clone(),
                json!({ "type": "object", "properties": {} }),
            )
        }));
        tools
    }

    /// Runs each emitted call once, in order. Repeated call ids are skipped.
    pub async fn dispatch(
        &self,
        calls: &[ToolCall],
        lead: &Lead,
        mock_tools: &[MockToolSpec],
        offered: &[ToolDefinition],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut seen = HashSet::new();

        for call in calls {
            if !seen.insert(call.id.as_str()) {
                debug!(call_id = %call.id, "Skipping repeated tool call");
                continue;
            }

            let name = call.function.name.as_str();
            let result = if !offered.iter().any(|tool| tool.name() == name) {
                warn!(tool = name, "Provider requested a tool that was not offered");
                ToolResult::rejected(name, format!("La herramienta {} no está disponible", name))
            } else {
                match ToolInvocation::parse(call, mock_tools) {
                    Ok(invocation) => {
                        info!(tool = name, call_id = %call.id, "Executing tool");
                        self.execute(&call.id, invocation, lead, &mut report).await
                    }
                    Err(e) => {
                        warn!(tool = name, error = %e, "Invalid tool arguments");
                        ToolResult::rejected(name, format!("Argumentos inválidos: {}", e))
                    }
                }
            };

            if !result.success() {
                warn!(tool = name, detail = result.message(), "Tool reported failure");
            }
            report.executed.push(ExecutedTool {
                call_id: call.id.clone(),
                result,
            });
        }

        report
    }

    async fn execute(
        &self,
        call_id: &str,
        invocation: ToolInvocation,
        lead: &Lead,
        report: &mut DispatchReport,
    ) -> ToolResult {
        match invocation {
            ToolInvocation::EscalateToHuman(args) => {
                let request = HandoffRequest {
                    lead_phone: lead.phone.clone(),
                    lead_name: lead.name.clone(),
                    reason: args.reason.clone(),
                    summary: args.summary.clone(),
                    urgency: args.urgency,
                    is_vip: args.is_vip,
                };
                match self.collaborators.handoff.notify_operator(request).await {
                    Ok(()) => {
                        report.escalation = Some(EscalationRecord {
                            reason: args.reason,
                            summary: args.summary,
                        });
                        ToolResult::EscalateToHuman {
                            success: true,
                            message: "Un asesor fue notificado y continuará la conversación".to_string(),
                        }
                    }
                    Err(e) => ToolResult::EscalateToHuman {
                        success: false,
                        message: format!("No se pudo notificar a un asesor: {}", e),
                    },
                }
            }
            ToolInvocation::ScheduleDemo(args) => {
                let name = args
                    .name
                    .as_deref()
                    .or(lead.name.as_deref())
                    .unwrap_or_default();
                match self.collaborators.scheduling.booking_link(&args.email, name).await {
                    Ok(booking) => ToolResult::ScheduleDemo {
                        success: true,
                        message: "Link de agenda generado, compártelo con el prospecto".to_string(),
                        booking_link: Some(booking.booking_link),
                    },
                    Err(e) => ToolResult::ScheduleDemo {
                        success: false,
                        message: format!("No se pudo generar el link de agenda: {}", e),
                        booking_link: None,
                    },
                }
            }
            ToolInvocation::SendPaymentLink(args) => {
                self.send_payment_link(call_id, args, lead, report).await
            }
            ToolInvocation::Mock { name, result } => ToolResult::Mock {
                message: format!("Resultado de {}", name),
                name,
                success: true,
                result,
            },
        }
    }

    async fn send_payment_link(
        &self,
        call_id: &str,
        args: PaymentLinkArgs,
        lead: &Lead,
        report: &mut DispatchReport,
    ) -> ToolResult {
        let phone = args.phone.clone().unwrap_or_else(|| lead.phone.clone());

        let session = match self
            .collaborators
            .payments
            .create_checkout(&args.email, &phone, &args.plan, call_id)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                return ToolResult::SendPaymentLink {
                    success: false,
                    message: format!("No se pudo crear el link de pago: {}", e),
                    checkout_url: None,
                }
            }
        };

        let text = format!(
            "Aquí tienes tu link de pago para el plan {}: {}",
            args.plan, session.checkout_url
        );
        if let Err(e) = self.collaborators.notifications.send_text(&phone, &text).await {
            return ToolResult::SendPaymentLink {
                success: false,
                message: format!(
                    "El link se creó pero no se pudo enviar ({}). Compártelo en tu respuesta",
                    e
                ),
                checkout_url: Some(session.checkout_url),
            };
        }

        if report.payment_link.is_none() {
            report.payment_link = Some(PaymentLinkRecord {
                plan: args.plan,
                email: args.email,
                url: session.checkout_url.clone(),
            });
        }
        ToolResult::SendPaymentLink {
            success: true,
            message: "Link de pago enviado al prospecto".to_string(),
            checkout_url: Some(session.checkout_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_is_tagged_by_tool_name() {
        let result = ToolResult::ScheduleDemo {
            success: true,
            message: "ok".to_string(),
            booking_link: Some("https://cal.example.com/x".to_string()),
        };
        let value: Value = serde_json::from_str(&result.content()).unwrap();
        assert_eq!(value["toolName"], "schedule_demo");
        assert_eq!(value["booking_link"], "https://cal.example.com/x");

        let back: ToolResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_parse_rejects_bad_email() {
        let call = ToolCall::new(
            "call_1",
            SEND_PAYMENT_LINK,
            json!({ "email": "no-es-email", "plan": "pro" }),
        );
        assert!(matches!(
            ToolInvocation::parse(&call, &[]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_mock_and_unknown() {
        let spec = MockToolSpec {
            name: "check_stock".to_string(),
            description: "Consulta inventario".to_string(),
            result: json!({ "available": 3 }),
        };
        let call = ToolCall::new("call_1", "check_stock", json!({}));
        match ToolInvocation::parse(&call, std::slice::from_ref(&spec)).unwrap() {
            ToolInvocation::Mock { name, result } => {
                assert_eq!(name, "check_stock");
                assert_eq!(result["available"], 3);
            }
            other => panic!("Expected mock invocation, got {:?}", other),
        }

        let unknown = ToolCall::new("call_2", "delete_everything", json!({}));
        assert!(matches!(
            ToolInvocation::parse(&unknown, &[spec]),
            Err(AppError::Tool(_))
        ));
    }

    #[test]
    fn test_escalation_defaults() {
        let call = ToolCall::new(
            "call_1",
            ESCALATE_TO_HUMAN,
            json!({ "reason": "pidió humano", "summary": "Quiere hablar con ventas" }),
        );
        match ToolInvocation::parse(&call, &[]).unwrap() {
            ToolInvocation::EscalateToHuman(args) => {
                assert_eq!(args.urgency, Urgency::Medium);
                assert!(!args.is_vip);
            }
            other => panic!("Expected escalation, got {:?}", other),
        }
    }
}
