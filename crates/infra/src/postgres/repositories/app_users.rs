use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::{PgPoolSquad, checkout},
    store_errors::DieselResultExt,
};
use domain::{
    repositories::{app_users::AppUserRepository, store_error::StoreResult},
    schema::app_users,
};

pub struct AppUserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AppUserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AppUserRepository for AppUserPostgres {
    async fn find_email(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        let mut conn = checkout(&self.db_pool)?;

        app_users::table
            .filter(app_users::id.eq(user_id))
            .select(app_users::email)
            .first::<String>(&mut conn)
            .optional()
            .store()
    }
}
