use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    entities::payments::{NewPaymentEntity, PaymentChangeset, PaymentEntity},
    repositories::{payments::PaymentRepository, store_error::StoreResult},
    schema::payments,
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn find_by_id(&self, payment_id: Uuid) -> StoreResult<Option<PaymentEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        payments::table
            .filter(payments::id.eq(payment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn find_by_procedure_id(
        &self,
        procedure_id: Uuid,
    ) -> StoreResult<Option<PaymentEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        payments::table
            .filter(payments::procedure_id.eq(procedure_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> StoreResult<Option<PaymentEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        payments::table
            .filter(payments::external_payment_intent_id.eq(payment_intent_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn insert_payment(&self, payment: NewPaymentEntity) -> StoreResult<PaymentEntity> {
        let mut conn = checkout(&self.db_pool)?;

        insert_into(payments::table)
            .values(&payment)
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(&mut conn)
            .store()
    }

    async fn update_payment(
        &self,
        payment_id: Uuid,
        mut changes: PaymentChangeset,
    ) -> StoreResult<PaymentEntity> {
        let mut conn = checkout(&self.db_pool)?;

        changes.updated_at.get_or_insert_with(Utc::now);

        update(payments::table.filter(payments::id.eq(payment_id)))
            .set(&changes)
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(&mut conn)
            .store()
    }
}
