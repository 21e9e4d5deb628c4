//! Stored object repository.

use std::sync::Arc;

use crate::entities::{ApObject, ap_object};
use chrono::Utc;
use hearth_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};

/// Repository over the `ap_object` table.
#[derive(Clone)]
pub struct ObjectRepository {
    db: Arc<DatabaseConnection>,
}

/// Values written by [`ObjectRepository::upsert`].
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// The value's `id` IRI.
    pub iri: String,
    /// The value's `type` tag.
    pub kind: String,
    /// Inbox IRI when the value is an actor.
    pub inbox: Option<String>,
    /// Outbox IRI when the value is an actor.
    pub outbox: Option<String>,
    /// Whether this server minted the IRI.
    pub local: bool,
    /// Full JSON document.
    pub body: serde_json::Value,
}

impl ObjectRepository {
    /// Create a new object repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an object by its IRI.
    pub async fn find_by_iri(&self, iri: &str) -> AppResult<Option<ap_object::Model>> {
        ApObject::find_by_id(iri)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the actor whose inbox is `inbox`.
    pub async fn find_by_inbox(&self, inbox: &str) -> AppResult<Option<ap_object::Model>> {
        ApObject::find()
            .filter(ap_object::Column::Inbox.eq(inbox))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the actor whose outbox is `outbox`.
    pub async fn find_by_outbox(&self, outbox: &str) -> AppResult<Option<ap_object::Model>> {
        ApObject::find()
            .filter(ap_object::Column::Outbox.eq(outbox))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert the record, or replace the stored document when the IRI exists.
    pub async fn upsert(&self, record: ObjectRecord) -> AppResult<()> {
        let now = Utc::now().fixed_offset();
        let model = ap_object::ActiveModel {
            iri: Set(record.iri),
            kind: Set(record.kind),
            inbox: Set(record.inbox),
            outbox: Set(record.outbox),
            local: Set(record.local),
            body: Set(record.body),
            created_at: Set(now),
            updated_at: Set(now),
        };

        ApObject::insert(model)
            .on_conflict(
                OnConflict::column(ap_object::Column::Iri)
                    .update_columns([
                        ap_object::Column::Kind,
                        ap_object::Column::Inbox,
                        ap_object::Column::Outbox,
                        ap_object::Column::Body,
                        ap_object::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete an object row. Deleting a missing row is not an error.
    pub async fn delete(&self, iri: &str) -> AppResult<()> {
        ApObject::delete_by_id(iri)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
