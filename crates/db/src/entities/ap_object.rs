//! Stored protocol value entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ap_object")]
pub struct Model {
    /// The value's `id` IRI.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub iri: String,

    /// The value's `type` tag (`Tombstone` once deleted).
    pub kind: String,

    /// Inbox IRI, set for actors only.
    #[sea_orm(nullable, column_type = "Text")]
    pub inbox: Option<String>,

    /// Outbox IRI, set for actors only.
    #[sea_orm(nullable, column_type = "Text")]
    pub outbox: Option<String>,

    /// Whether the IRI is minted by this server.
    pub local: bool,

    /// Full JSON document.
    pub body: Json,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
