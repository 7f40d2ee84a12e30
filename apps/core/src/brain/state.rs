//! Dialogue state machine.
//!
//! `transition(state, signal)` is a total table: every (state, signal) pair names exactly one
//! directive, and the directive renders the terminal instruction of the prompt.

use serde::{Deserialize, Serialize};

use super::intent::Intent;
use super::objection::ObjectionKind;
use crate::models::LifecycleStage;

/// Where the conversation stands before this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    Opening,
    Discovery,
    Qualified,
    AppointmentBooked,
    Customer,
    Dormant,
}

impl DialogueState {
    pub fn derive(stage: LifecycleStage, has_active_appointment: bool, history_len: usize) -> Self {
        if has_active_appointment {
            return DialogueState::AppointmentBooked;
        }
        match stage {
            LifecycleStage::New if history_len == 0 => DialogueState::Opening,
            LifecycleStage::New | LifecycleStage::Contacted => DialogueState::Discovery,
            LifecycleStage::Qualified => DialogueState::Qualified,
            LifecycleStage::DemoScheduled => DialogueState::AppointmentBooked,
            LifecycleStage::Customer => DialogueState::Customer,
            LifecycleStage::Lost => DialogueState::Dormant,
        }
    }
}

/// What this turn's message signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "signal", content = "objection")]
pub enum TurnSignal {
    Greeting,
    HumanRequest,
    ReadyToBuy,
    WantsDemo,
    AsksPrice,
    Objection(ObjectionKind),
    Question,
    Statement,
}

impl TurnSignal {
    /// A handoff request outranks everything; an objection outranks other intents.
    pub fn derive(intent: Intent, objection: ObjectionKind) -> Self {
        match (intent, objection) {
            (Intent::HumanRequest, _) => TurnSignal::HumanRequest,
            (_, kind) if kind.is_some() => TurnSignal::Objection(kind),
            (Intent::PurchaseIntent, _) => TurnSignal::ReadyToBuy,
            (Intent::DemoRequest, _) => TurnSignal::WantsDemo,
            (Intent::PricingQuestion, _) => TurnSignal::AsksPrice,
            (Intent::Greeting, _) => TurnSignal::Greeting,
            (Intent::Question, _) => TurnSignal::Question,
            (Intent::Unknown, _) => TurnSignal::Statement,
        }
    }
}

/// Terminal instruction for the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "directive", content = "objection")]
pub enum Directive {
    GreetAndDiscover,
    ContinueDiscovery,
    AnswerAndAdvance,
    QuotePrice,
    HandleObjection(ObjectionKind),
    OfferDemo,
    ConfirmExistingAppointment,
    ClosePayment,
    HandoffHuman,
    SupportCustomer,
    Reengage,
}

impl Directive {
    pub fn instruction(&self) -> String {
        match self {
            Directive::GreetAndDiscover => {
                "Saluda de forma breve y cálida y haz UNA pregunta para conocer su negocio.".to_string()
            }
            Directive::ContinueDiscovery => {
                "Continúa el descubrimiento: haz UNA pregunta sobre un dato que aún no conozcas.".to_string()
            }
            Directive::AnswerAndAdvance => {
                "Responde su pregunta de forma directa y avanza la conversación con UNA pregunta.".to_string()
            }
            Directive::QuotePrice => {
                "Da el precio sin rodeos, relaciónalo con su negocio y pregunta si quiere ver una demo.".to_string()
            }
            Directive::HandleObjection(kind) => format!(
                "Maneja la objeción ({}) antes de avanzar. No insistas ni presiones.",
                kind.display_name()
            ),
            Directive::OfferDemo => {
                "Ofrece agendar una demo corta; si acepta, usa la herramienta schedule_demo.".to_string()
            }
            Directive::ConfirmExistingAppointment => {
                "Ya tiene una cita agendada: confírmala y resuelve dudas. No ofrezcas otra demo.".to_string()
            }
            Directive::ClosePayment => {
                "Está listo para comprar: confirma plan y correo y usa send_payment_link.".to_string()
            }
            Directive::HandoffHuman => {
                "Pidió hablar con una persona: usa escalate_to_human y avísale que un asesor lo contactará.".to_string()
            }
            Directive::SupportCustomer => {
                "Es cliente: atiende su solicitud con prioridad; si es un problema, escala a un humano.".to_string()
            }
            Directive::Reengage => {
                "Retoma la conversación con amabilidad y pregunta si su situación cambió.".to_string()
            }
        }
    }

    /// An active appointment turns any demo offer into a confirmation.
    pub fn with_appointment(self, has_active_appointment: bool) -> Self {
        match self {
            Directive::OfferDemo if has_active_appointment => Directive::ConfirmExistingAppointment,
            other => other,
        }
    }
}

pub fn transition(state: DialogueState, signal: TurnSignal) -> Directive {
    use DialogueState as S;
    use TurnSignal as T;

    match (state, signal) {
        (_, T::HumanRequest) => Directive::HandoffHuman,
        (S::Customer, _) => Directive::SupportCustomer,
        (_, T::ReadyToBuy) => Directive::ClosePayment,
        (_, T::Objection(kind)) => Directive::HandleObjection(kind),

        (S::AppointmentBooked, T::WantsDemo) => Directive::ConfirmExistingAppointment,
        (_, T::WantsDemo) => Directive::OfferDemo,

        (S::Opening, T::Greeting | T::Statement) => Directive::GreetAndDiscover,
        (S::Opening | S::Discovery, T::AsksPrice) => Directive::QuotePrice,
        (S::Qualified, T::AsksPrice) => Directive::QuotePrice,
        (S::AppointmentBooked, T::AsksPrice) => Directive::AnswerAndAdvance,
        (S::Dormant, T::AsksPrice) => Directive::QuotePrice,

        (S::Discovery, T::Greeting | T::Statement) => Directive::ContinueDiscovery,
        (S::Qualified, T::Greeting | T::Statement) => Directive::OfferDemo,
        (S::AppointmentBooked, T::Greeting | T::Statement) => Directive::ConfirmExistingAppointment,
        (S::Dormant, T::Greeting | T::Statement) => Directive::Reengage,

        (_, T::Question) => Directive::AnswerAndAdvance,
    }
}
