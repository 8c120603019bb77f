use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    Connection, OptionalExtension, RunQueryDsl, delete, insert_into, pg::PgConnection,
    prelude::*, result::Error as DieselError, upsert::excluded,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    repositories::{store_error::StoreResult, subscriptions::SubscriptionRepository},
    schema::subscriptions,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<SubscriptionEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        subscriptions::table
            .filter(subscriptions::external_subscription_id.eq(external_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn replace_for_user(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity> {
        let mut conn = checkout(&self.db_pool)?;
        let conn: &mut PgConnection = &mut conn;

        conn.transaction::<_, DieselError, _>(|conn| {
            delete(
                subscriptions::table
                    .filter(subscriptions::user_id.eq(subscription.user_id))
                    .filter(
                        subscriptions::external_subscription_id
                            .ne(subscription.external_subscription_id.as_str()),
                    ),
            )
            .execute(conn)?;

            upsert_by_external_id(conn, &subscription)
        })
        .store()
    }
}

// A conflict on user_id (a concurrent writer stored another external id for the
// same user) still surfaces as a unique violation for the caller to resolve.
fn upsert_by_external_id(
    conn: &mut PgConnection,
    subscription: &UpsertSubscriptionEntity,
) -> QueryResult<SubscriptionEntity> {
    insert_into(subscriptions::table)
        .values(subscription)
        .on_conflict(subscriptions::external_subscription_id)
        .do_update()
        .set((
            subscriptions::user_id.eq(excluded(subscriptions::user_id)),
            subscriptions::external_price_id.eq(excluded(subscriptions::external_price_id)),
            subscriptions::status.eq(excluded(subscriptions::status)),
            subscriptions::current_period_start.eq(excluded(subscriptions::current_period_start)),
            subscriptions::current_period_end.eq(excluded(subscriptions::current_period_end)),
            subscriptions::cancel_at_period_end.eq(excluded(subscriptions::cancel_at_period_end)),
            subscriptions::updated_at.eq(Utc::now()),
        ))
        .returning(SubscriptionEntity::as_returning())
        .get_result::<SubscriptionEntity>(conn)
}
