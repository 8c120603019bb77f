use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    schema::payments,
    value_objects::{
        enums::payment_statuses::PaymentStatus, reconciliation::ReconciledPayment,
    },
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub procedure_id: Option<Uuid>,
    pub external_payment_intent_id: String,
    pub external_charge_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentEntity {
    pub fn view(&self) -> ReconciledPayment {
        ReconciledPayment {
            id: self.id,
            external_payment_intent_id: self.external_payment_intent_id.clone(),
            status: self.status,
            amount_minor: self.amount_minor,
            currency: self.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub owner_user_id: Uuid,
    pub procedure_id: Option<Uuid>,
    pub external_payment_intent_id: String,
    pub external_charge_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

// NewPaymentEntity is the application-facing alias for inserting rows into `payments`.
pub type NewPaymentEntity = InsertPaymentEntity;

/// Partial update; `procedure_id: Some(None)` detaches the row from its case.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = payments)]
pub struct PaymentChangeset {
    pub procedure_id: Option<Option<Uuid>>,
    pub external_payment_intent_id: Option<String>,
    pub external_charge_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<PaymentStatus>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}
