use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::{
    entities::procedures::ProcedureEntity,
    value_objects::enums::procedure_statuses::ProcedureStatus,
};

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait ProcedureRepository {
    async fn find_by_id(&self, procedure_id: Uuid) -> StoreResult<Option<ProcedureEntity>>;

    /// Writes the lifecycle columns of `next` if the stored version still equals
    /// `next.version`, bumping it. Returns the stored row or `StaleWrite`.
    async fn save_lifecycle(&self, next: &ProcedureEntity) -> StoreResult<ProcedureEntity>;

    async fn list_dispatched_on_or_before(
        &self,
        status: ProcedureStatus,
        cutoff: NaiveDate,
    ) -> StoreResult<Vec<ProcedureEntity>>;

    /// `NOTICE_SENT` cases dispatched on or before `cutoff` whose follow-up is not sent yet.
    async fn list_follow_up_candidates(
        &self,
        cutoff: NaiveDate,
    ) -> StoreResult<Vec<ProcedureEntity>>;

    /// Sets the follow-up marker if it is still unset. `false` when another run won.
    async fn claim_follow_up(&self, procedure_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Clears a marker previously claimed at `at`.
    async fn release_follow_up(&self, procedure_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Records the billed notice fee if none is recorded yet.
    async fn set_notice_fee_item_ref(
        &self,
        procedure_id: Uuid,
        item_ref: &str,
    ) -> StoreResult<bool>;

    /// Hard delete, only while the case is still a draft.
    async fn delete_draft(&self, procedure_id: Uuid) -> StoreResult<bool>;
}
