use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    entities::payment_provider_customers::InsertPaymentProviderCustomerEntity,
    repositories::{
        payment_provider_customers::PaymentProviderCustomerRepository, store_error::StoreResult,
    },
    schema::payment_provider_customers,
};

pub struct PaymentProviderCustomerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentProviderCustomerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for PaymentProviderCustomerPostgres {
    async fn find_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> StoreResult<Option<String>> {
        let mut conn = checkout(&self.db_pool)?;

        payment_provider_customers::table
            .filter(payment_provider_customers::user_id.eq(user_id))
            .filter(payment_provider_customers::provider.eq(provider))
            .select(payment_provider_customers::customer_ref)
            .first::<String>(&mut conn)
            .optional()
            .store()
    }

    async fn find_user_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> StoreResult<Option<Uuid>> {
        let mut conn = checkout(&self.db_pool)?;

        payment_provider_customers::table
            .filter(payment_provider_customers::provider.eq(provider))
            .filter(payment_provider_customers::customer_ref.eq(customer_ref))
            .select(payment_provider_customers::user_id)
            .first::<Uuid>(&mut conn)
            .optional()
            .store()
    }

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> StoreResult<()> {
        let mut conn = checkout(&self.db_pool)?;

        let insert_entity = InsertPaymentProviderCustomerEntity {
            user_id,
            provider: provider.to_string(),
            customer_ref: customer_ref.to_string(),
            metadata: json!({}),
        };

        insert_into(payment_provider_customers::table)
            .values(&insert_entity)
            .on_conflict((
                payment_provider_customers::user_id,
                payment_provider_customers::provider,
            ))
            .do_update()
            .set(
                payment_provider_customers::customer_ref
                    .eq(excluded(payment_provider_customers::customer_ref)),
            )
            .execute(&mut conn)
            .store()?;

        Ok(())
    }
}
