use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    entities::documents::{DocumentEntity, InsertDocumentEntity},
    repositories::{documents::DocumentRepository, store_error::StoreResult},
    schema::documents,
};

pub struct DocumentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DocumentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DocumentRepository for DocumentPostgres {
    async fn list_by_procedure(&self, procedure_id: Uuid) -> StoreResult<Vec<DocumentEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        documents::table
            .filter(documents::procedure_id.eq(procedure_id))
            .order(documents::created_at.asc())
            .select(DocumentEntity::as_select())
            .load::<DocumentEntity>(&mut conn)
            .store()
    }

    async fn insert_document(&self, document: InsertDocumentEntity) -> StoreResult<DocumentEntity> {
        let mut conn = checkout(&self.db_pool)?;

        insert_into(documents::table)
            .values(&document)
            .returning(DocumentEntity::as_returning())
            .get_result::<DocumentEntity>(&mut conn)
            .store()
    }
}
