use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait PaymentProviderCustomerRepository {
    async fn find_customer_ref(&self, user_id: Uuid, provider: &str)
    -> StoreResult<Option<String>>;

    async fn find_user_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> StoreResult<Option<Uuid>>;

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> StoreResult<()>;
}
