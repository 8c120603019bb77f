use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::comments::{CommentEntity, InsertCommentEntity};

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait CommentRepository {
    async fn find_by_signature(
        &self,
        procedure_id: Uuid,
        signature: &str,
    ) -> StoreResult<Option<CommentEntity>>;

    async fn insert_comment(&self, comment: InsertCommentEntity) -> StoreResult<CommentEntity>;
}
