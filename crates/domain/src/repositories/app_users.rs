use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait AppUserRepository {
    async fn find_email(&self, user_id: Uuid) -> StoreResult<Option<String>>;
}
