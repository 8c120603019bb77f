use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use domain::{
    entities::payments::{NewPaymentEntity, PaymentChangeset, PaymentEntity},
    repositories::{
        payments::PaymentRepository,
        store_error::{StoreError, StoreResult},
    },
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payment_processor::{PaymentSnapshot, Settlement, metadata_keys},
    },
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_LEDGER_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub payment: PaymentEntity,
    /// Another procedure already owns this intent; the row was left bound to it.
    pub shared_with: Option<Uuid>,
}

pub fn payment_status_of(settlement: Settlement) -> PaymentStatus {
    match settlement {
        Settlement::Succeeded => PaymentStatus::Succeeded,
        Settlement::Pending => PaymentStatus::Pending,
        Settlement::Failed => PaymentStatus::Failed,
    }
}

/// Records processor payments exactly once per intent and at most once per procedure.
///
/// Every write is keyed by a unique column; a unique violation means a concurrent
/// writer got there first, so the ledger re-reads and resumes.
pub struct PaymentLedger {
    payments: Arc<dyn PaymentRepository + Send + Sync>,
}

impl PaymentLedger {
    pub fn new(payments: Arc<dyn PaymentRepository + Send + Sync>) -> Self {
        Self { payments }
    }

    pub async fn record(
        &self,
        snapshot: &PaymentSnapshot,
        owner_user_id: Uuid,
        bind_to: Option<Uuid>,
    ) -> StoreResult<LedgerEntry> {
        let mut bind_to = bind_to;

        for attempt in 1..=MAX_LEDGER_ATTEMPTS {
            match self.try_record(snapshot, owner_user_id, &mut bind_to).await {
                Err(StoreError::UniqueViolation(constraint)) => {
                    debug!(
                        intent_id = %snapshot.intent_id,
                        %constraint,
                        attempt,
                        "reconciliation: payment write lost a race, re-reading"
                    );
                }
                other => return other,
            }
        }

        Err(StoreError::Internal(anyhow!(
            "payment for intent {} kept conflicting",
            snapshot.intent_id
        )))
    }

    async fn try_record(
        &self,
        snapshot: &PaymentSnapshot,
        owner_user_id: Uuid,
        bind_to: &mut Option<Uuid>,
    ) -> StoreResult<LedgerEntry> {
        if let Some(procedure_id) = *bind_to {
            if let Some(row) = self.payments.find_by_procedure_id(procedure_id).await? {
                if row.external_payment_intent_id == snapshot.intent_id {
                    return self.merge(row, snapshot, None).await.map(unshared);
                }

                if row.status == PaymentStatus::Succeeded {
                    warn!(
                        %procedure_id,
                        committed_intent = %row.external_payment_intent_id,
                        intent_id = %snapshot.intent_id,
                        "reconciliation: procedure already has a committed payment, recording intent unbound"
                    );
                    *bind_to = None;
                } else {
                    match self
                        .payments
                        .find_by_payment_intent_id(&snapshot.intent_id)
                        .await?
                    {
                        None => {
                            info!(
                                %procedure_id,
                                previous_intent = %row.external_payment_intent_id,
                                intent_id = %snapshot.intent_id,
                                "reconciliation: rebinding procedure payment to new intent"
                            );
                            let changes = PaymentChangeset {
                                external_payment_intent_id: Some(snapshot.intent_id.clone()),
                                ..full_changeset(&row, snapshot)
                            };
                            let updated = self.payments.update_payment(row.id, changes).await?;
                            return Ok(unshared(updated));
                        }
                        Some(_) => {
                            self.payments
                                .update_payment(
                                    row.id,
                                    PaymentChangeset {
                                        procedure_id: Some(None),
                                        updated_at: Some(Utc::now()),
                                        ..Default::default()
                                    },
                                )
                                .await?;
                        }
                    }
                }
            }
        }

        if let Some(row) = self
            .payments
            .find_by_payment_intent_id(&snapshot.intent_id)
            .await?
        {
            return match (row.procedure_id, *bind_to) {
                (None, attach) => self.merge(row, snapshot, attach).await.map(unshared),
                (Some(bound), Some(target)) if bound != target => {
                    warn!(
                        intent_id = %snapshot.intent_id,
                        bound_procedure_id = %bound,
                        procedure_id = %target,
                        "reconciliation: intent already belongs to another procedure"
                    );
                    let payment = self.merge(row, snapshot, None).await?;
                    Ok(LedgerEntry {
                        payment,
                        shared_with: Some(bound),
                    })
                }
                _ => self.merge(row, snapshot, None).await.map(unshared),
            };
        }

        let inserted = self
            .payments
            .insert_payment(NewPaymentEntity {
                owner_user_id,
                procedure_id: *bind_to,
                external_payment_intent_id: snapshot.intent_id.clone(),
                external_charge_id: snapshot.charge_id.clone(),
                amount_minor: snapshot.amount_minor,
                currency: snapshot.currency.clone(),
                status: payment_status_of(snapshot.settlement),
                description: snapshot.description.clone(),
                metadata: merged_metadata(&Value::Object(Map::new()), snapshot),
            })
            .await?;
        info!(
            payment_id = %inserted.id,
            intent_id = %snapshot.intent_id,
            status = %inserted.status,
            "reconciliation: payment recorded"
        );
        Ok(unshared(inserted))
    }

    /// A succeeded row only takes metadata enrichment and a missing procedure link.
    async fn merge(
        &self,
        row: PaymentEntity,
        snapshot: &PaymentSnapshot,
        attach: Option<Uuid>,
    ) -> StoreResult<PaymentEntity> {
        let attach = attach.filter(|_| row.procedure_id.is_none());
        let changes = if row.status == PaymentStatus::Succeeded {
            let metadata = merged_metadata(&row.metadata, snapshot);
            if metadata == row.metadata && attach.is_none() {
                return Ok(row);
            }
            PaymentChangeset {
                metadata: Some(metadata),
                updated_at: Some(Utc::now()),
                ..Default::default()
            }
        } else {
            full_changeset(&row, snapshot)
        };

        let changes = PaymentChangeset {
            procedure_id: attach.map(Some),
            ..changes
        };
        self.payments.update_payment(row.id, changes).await
    }
}

fn unshared(payment: PaymentEntity) -> LedgerEntry {
    LedgerEntry {
        payment,
        shared_with: None,
    }
}

fn full_changeset(row: &PaymentEntity, snapshot: &PaymentSnapshot) -> PaymentChangeset {
    PaymentChangeset {
        external_charge_id: snapshot.charge_id.clone(),
        amount_minor: Some(snapshot.amount_minor),
        currency: Some(snapshot.currency.clone()),
        status: Some(payment_status_of(snapshot.settlement)),
        description: snapshot.description.clone(),
        metadata: Some(merged_metadata(&row.metadata, snapshot)),
        updated_at: Some(Utc::now()),
        ..Default::default()
    }
}

fn merged_metadata(existing: &Value, snapshot: &PaymentSnapshot) -> Value {
    let mut merged = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in &snapshot.metadata {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    if let Some(message) = &snapshot.failure_message {
        merged.insert(
            metadata_keys::FAILURE_MESSAGE.to_string(),
            Value::String(message.clone()),
        );
    }
    Value::Object(merged)
}
