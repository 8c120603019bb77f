use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity};

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<SubscriptionEntity>>;

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>>;

    /// Insert or update keyed by `external_subscription_id`. Any other row stored
    /// for the same user is deleted in the same transaction.
    async fn replace_for_user(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity>;
}
