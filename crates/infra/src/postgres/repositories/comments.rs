use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    entities::comments::{CommentEntity, InsertCommentEntity},
    repositories::{comments::CommentRepository, store_error::StoreResult},
    schema::comments,
};

pub struct CommentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CommentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CommentRepository for CommentPostgres {
    async fn find_by_signature(
        &self,
        procedure_id: Uuid,
        signature: &str,
    ) -> StoreResult<Option<CommentEntity>> {
        let mut conn = checkout(&self.db_pool)?;

        comments::table
            .filter(comments::procedure_id.eq(procedure_id))
            .filter(comments::signature.eq(signature))
            .select(CommentEntity::as_select())
            .first::<CommentEntity>(&mut conn)
            .optional()
            .store()
    }

    async fn insert_comment(&self, comment: InsertCommentEntity) -> StoreResult<CommentEntity> {
        let mut conn = checkout(&self.db_pool)?;

        insert_into(comments::table)
            .values(&comment)
            .returning(CommentEntity::as_returning())
            .get_result::<CommentEntity>(&mut conn)
            .store()
    }
}
