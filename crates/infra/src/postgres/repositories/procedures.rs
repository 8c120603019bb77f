use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{OptionalExtension, RunQueryDsl, delete, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    entities::procedures::ProcedureEntity,
    repositories::{
        procedures::ProcedureRepository,
        store_error::{StoreError, StoreResult},
    },
    schema::procedures,
    value_objects::enums::procedure_statuses::ProcedureStatus,
};

pub struct ProcedurePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProcedurePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProcedureRepository for ProcedurePostgres {
    async fn find_by_id(&self, procedure_id: Uuid) -> StoreResult<Option<ProcedureEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        procedures::table
            .filter(procedures::id.eq(procedure_id))
            .select(ProcedureEntity::as_select())
            .first::<ProcedureEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn save_lifecycle(&self, next: &ProcedureEntity) -> StoreResult<ProcedureEntity> {
        let mut conn = checkout(&self.db_pool)?;

        let saved = update(
            procedures::table
                .filter(procedures::id.eq(next.id))
                .filter(procedures::version.eq(next.version)),
        )
        .set((
            &next.lifecycle_changeset(),
            procedures::version.eq(procedures::version + 1),
            procedures::updated_at.eq(Utc::now()),
        ))
        .returning(ProcedureEntity::as_returning())
        .get_result::<ProcedureEntity>(&mut conn)
        .optional()
        .store()?;

        saved.ok_or(StoreError::StaleWrite)
    }

    async fn list_dispatched_on_or_before(
        &self,
        status: ProcedureStatus,
        cutoff: NaiveDate,
    ) -> StoreResult<Vec<ProcedureEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        procedures::table
            .filter(procedures::status.eq(status))
            .filter(procedures::dispatch_date.le(cutoff))
            .order(procedures::dispatch_date.asc())
            .select(ProcedureEntity::as_select())
            .load::<ProcedureEntity>(&mut conn)
            .store()
    }

    async fn list_follow_up_candidates(
        &self,
        cutoff: NaiveDate,
    ) -> StoreResult<Vec<ProcedureEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        procedures::table
            .filter(procedures::status.eq(ProcedureStatus::NoticeSent))
            .filter(procedures::dispatch_date.le(cutoff))
            .filter(procedures::follow_up_sent_at.is_null())
            .order(procedures::dispatch_date.asc())
            .select(ProcedureEntity::as_select())
            .load::<ProcedureEntity>(&mut conn)
            .store()
    }

    async fn claim_follow_up(&self, procedure_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = checkout(&self.db_pool)?;

        let claimed = update(
            procedures::table
                .filter(procedures::id.eq(procedure_id))
                .filter(procedures::status.eq(ProcedureStatus::NoticeSent))
                .filter(procedures::follow_up_sent_at.is_null()),
        )
        .set((
            procedures::follow_up_sent_at.eq(Some(at)),
            procedures::version.eq(procedures::version + 1),
        ))
        .execute(&mut conn)
        .store()?;

        Ok(claimed == 1)
    }

    async fn release_follow_up(&self, procedure_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = checkout(&self.db_pool)?;

        update(
            procedures::table
                .filter(procedures::id.eq(procedure_id))
                .filter(procedures::follow_up_sent_at.eq(at)),
        )
        .set((
            procedures::follow_up_sent_at.eq(None::<DateTime<Utc>>),
            procedures::version.eq(procedures::version + 1),
        ))
        .execute(&mut conn)
        .store()?;

        Ok(())
    }

    async fn set_notice_fee_item_ref(
        &self,
        procedure_id: Uuid,
        item_ref: &str,
    ) -> StoreResult<bool> {
        let mut conn = checkout(&self.db_pool)?;

        let written = update(
            procedures::table
                .filter(procedures::id.eq(procedure_id))
                .filter(procedures::notice_fee_item_ref.is_null()),
        )
        .set((
            procedures::notice_fee_item_ref.eq(item_ref),
            procedures::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .store()?;

        Ok(written == 1)
    }

    async fn delete_draft(&self, procedure_id: Uuid) -> StoreResult<bool> {
        let mut conn = checkout(&self.db_pool)?;

        let deleted = delete(
            procedures::table
                .filter(procedures::id.eq(procedure_id))
                .filter(procedures::status.eq(ProcedureStatus::Draft)),
        )
        .execute(&mut conn)
        .store()?;

        Ok(deleted == 1)
    }
}
