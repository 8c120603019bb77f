use std::sync::Arc;

use chrono::{DateTime, Utc};

use domain::{
    entities::{
        comments::{CommentEntity, InsertCommentEntity},
        documents::InsertDocumentEntity,
    },
    repositories::{
        comments::CommentRepository,
        documents::DocumentRepository,
        store_error::{StoreError, StoreResult},
    },
    value_objects::{
        enums::document_kinds::DocumentKind, payment_processor::Metadata,
        payment_processor::metadata_keys, signatures::content_signature,
    },
};
use tracing::{debug, info};
use uuid::Uuid;

/// Writes documents and notes at most once per procedure, keyed by content signature.
pub struct CaseRecords {
    documents: Arc<dyn DocumentRepository + Send + Sync>,
    comments: Arc<dyn CommentRepository + Send + Sync>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializedRecords {
    pub documents_created: usize,
    pub note_created: bool,
}

pub fn document_signature(procedure_id: Uuid, kind: DocumentKind, storage_key: &str) -> String {
    content_signature(&[
        "document",
        &procedure_id.to_string(),
        kind.as_str(),
        storage_key,
    ])
}

pub fn comment_signature(procedure_id: Uuid, author: Option<Uuid>, body: &str) -> String {
    let author = author.map(|id| id.to_string()).unwrap_or_default();
    content_signature(&["comment", &procedure_id.to_string(), &author, body])
}

impl CaseRecords {
    pub fn new(
        documents: Arc<dyn DocumentRepository + Send + Sync>,
        comments: Arc<dyn CommentRepository + Send + Sync>,
    ) -> Self {
        Self {
            documents,
            comments,
        }
    }

    pub async fn has_injunction_support(&self, procedure_id: Uuid) -> StoreResult<bool> {
        let documents = self.documents.list_by_procedure(procedure_id).await?;
        Ok(domain::entities::documents::has_injunction_support(
            &documents,
        ))
    }

    /// Returns `true` when a new document row was written.
    pub async fn ensure_document(
        &self,
        procedure_id: Uuid,
        kind: DocumentKind,
        storage_key: &str,
    ) -> StoreResult<bool> {
        let signature = document_signature(procedure_id, kind, storage_key);
        let existing = self.documents.list_by_procedure(procedure_id).await?;
        if existing.iter().any(|doc| doc.signature == signature) {
            debug!(%procedure_id, kind = kind.as_str(), "case records: document already present");
            return Ok(false);
        }

        match self
            .documents
            .insert_document(InsertDocumentEntity {
                procedure_id,
                kind,
                storage_key: storage_key.to_string(),
                signature,
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::UniqueViolation(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn ensure_note(
        &self,
        procedure_id: Uuid,
        author_user_id: Option<Uuid>,
        body: &str,
    ) -> StoreResult<bool> {
        let signature = comment_signature(procedure_id, author_user_id, body);
        if self
            .comments
            .find_by_signature(procedure_id, &signature)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        match self
            .comments
            .insert_comment(InsertCommentEntity {
                procedure_id,
                author_user_id,
                body: body.to_string(),
                signature,
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::UniqueViolation(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Appends a conversation message; the timestamp keeps repeated bodies distinct.
    pub async fn add_message(
        &self,
        procedure_id: Uuid,
        author_user_id: Uuid,
        body: &str,
        posted_at: DateTime<Utc>,
    ) -> StoreResult<CommentEntity> {
        let signature = content_signature(&[
            "message",
            &procedure_id.to_string(),
            &author_user_id.to_string(),
            &posted_at.to_rfc3339(),
            body,
        ]);
        self.comments
            .insert_comment(InsertCommentEntity {
                procedure_id,
                author_user_id: Some(author_user_id),
                body: body.to_string(),
                signature,
            })
            .await
    }

    /// Attaches the supporting documents and the case note referenced by an
    /// injunction checkout's metadata.
    pub async fn materialize_injunction(
        &self,
        procedure_id: Uuid,
        owner_user_id: Uuid,
        metadata: &Metadata,
    ) -> StoreResult<MaterializedRecords> {
        let mut result = MaterializedRecords::default();

        for (kind, key) in [
            (DocumentKind::CompanyExtract, metadata_keys::COMPANY_EXTRACT_KEY),
            (DocumentKind::SignedAffidavit, metadata_keys::AFFIDAVIT_KEY),
        ] {
            let Some(storage_key) = metadata.get(key).filter(|value| !value.is_empty()) else {
                continue;
            };
            if self.ensure_document(procedure_id, kind, storage_key).await? {
                result.documents_created += 1;
            }
        }

        if let Some(note) = metadata
            .get(metadata_keys::INJUNCTION_NOTE)
            .filter(|value| !value.is_empty())
        {
            result.note_created = self
                .ensure_note(procedure_id, Some(owner_user_id), note)
                .await?;
        }

        if result != MaterializedRecords::default() {
            info!(
                %procedure_id,
                documents_created = result.documents_created,
                note_created = result.note_created,
                "case records: injunction records materialized"
            );
        }
        Ok(result)
    }
}
