use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::payments::{NewPaymentEntity, PaymentChangeset, PaymentEntity};

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn find_by_id(&self, payment_id: Uuid) -> StoreResult<Option<PaymentEntity>>;

    async fn find_by_procedure_id(&self, procedure_id: Uuid)
    -> StoreResult<Option<PaymentEntity>>;

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> StoreResult<Option<PaymentEntity>>;

    /// Fails with `UniqueViolation` when the intent or the procedure is already taken.
    async fn insert_payment(&self, payment: NewPaymentEntity) -> StoreResult<PaymentEntity>;

    async fn update_payment(
        &self,
        payment_id: Uuid,
        changes: PaymentChangeset,
    ) -> StoreResult<PaymentEntity>;
}
