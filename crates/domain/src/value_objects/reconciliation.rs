use serde::Serialize;
use uuid::Uuid;

use super::{
    enums::{payment_statuses::PaymentStatus, procedure_statuses::ProcedureStatus},
    payment_processor::Settlement,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReference {
    Session(String),
    Intent(String),
}

impl PaymentReference {
    pub fn id(&self) -> &str {
        match self {
            PaymentReference::Session(id) | PaymentReference::Intent(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileCommand {
    pub reference: PaymentReference,
    pub procedure_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedTransition {
    pub from: ProcedureStatus,
    pub to: ProcedureStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledPayment {
    pub id: Uuid,
    pub external_payment_intent_id: String,
    pub status: PaymentStatus,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledProcedure {
    pub id: Uuid,
    pub status: ProcedureStatus,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub settlement: SettlementView,
    pub payment: Option<ReconciledPayment>,
    pub procedure: Option<ReconciledProcedure>,
    /// Set when a transition was written by this call.
    pub applied: Option<AppliedTransition>,
    /// Procedure that already owns the same payment intent, if any.
    pub shared_with: Option<Uuid>,
}

impl ReconcileReport {
    pub fn pending() -> Self {
        Self {
            settlement: SettlementView::Pending,
            payment: None,
            procedure: None,
            applied: None,
            shared_with: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementView {
    Succeeded,
    Pending,
    Failed,
}

impl From<Settlement> for SettlementView {
    fn from(value: Settlement) -> Self {
        match value {
            Settlement::Succeeded => SettlementView::Succeeded,
            Settlement::Pending => SettlementView::Pending,
            Settlement::Failed => SettlementView::Failed,
        }
    }
}
