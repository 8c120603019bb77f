use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{schema::documents, value_objects::enums::document_kinds::DocumentKind};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = documents)]
pub struct DocumentEntity {
    pub id: Uuid,
    pub procedure_id: Uuid,
    pub kind: DocumentKind,
    pub storage_key: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct InsertDocumentEntity {
    pub procedure_id: Uuid,
    pub kind: DocumentKind,
    pub storage_key: String,
    pub signature: String,
}

/// True when every kind an injunction request needs is attached.
pub fn has_injunction_support(documents: &[DocumentEntity]) -> bool {
    DocumentKind::INJUNCTION_SUPPORT
        .iter()
        .all(|required| documents.iter().any(|doc| doc.kind == *required))
}
