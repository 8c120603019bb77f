use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::comments;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = comments)]
pub struct CommentEntity {
    pub id: Uuid,
    pub procedure_id: Uuid,
    pub author_user_id: Option<Uuid>,
    pub body: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub struct InsertCommentEntity {
    pub procedure_id: Uuid,
    pub author_user_id: Option<Uuid>,
    pub body: String,
    pub signature: String,
}
