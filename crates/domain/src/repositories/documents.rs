use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::documents::{DocumentEntity, InsertDocumentEntity};

use super::store_error::StoreResult;

#[automock]
#[async_trait]
pub trait DocumentRepository {
    async fn list_by_procedure(&self, procedure_id: Uuid) -> StoreResult<Vec<DocumentEntity>>;

    /// `UniqueViolation` when a document with the same signature already exists for the case.
    async fn insert_document(&self, document: InsertDocumentEntity) -> StoreResult<DocumentEntity>;
}
