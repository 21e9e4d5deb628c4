//! Create ap_object table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApObject::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApObject::Iri).text().not_null().primary_key())
                    .col(ColumnDef::new(ApObject::Kind).string_len(64).not_null())
                    .col(ColumnDef::new(ApObject::Inbox).text())
                    .col(ColumnDef::new(ApObject::Outbox).text())
                    .col(
                        ColumnDef::new(ApObject::Local)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ApObject::Body).json_binary().not_null())
                    .col(
                        ColumnDef::new(ApObject::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ApObject::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: inbox (actor lookup on delivery)
        manager
            .create_index(
                Index::create()
                    .name("idx_ap_object_inbox")
                    .table(ApObject::Table)
                    .col(ApObject::Inbox)
                    .to_owned(),
            )
            .await?;

        // Index: outbox (actor lookup on C2S post)
        manager
            .create_index(
                Index::create()
                    .name("idx_ap_object_outbox")
                    .table(ApObject::Table)
                    .col(ApObject::Outbox)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApObject::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ApObject {
    Table,
    Iri,
    Kind,
    Inbox,
    Outbox,
    Local,
    Body,
    CreatedAt,
    UpdatedAt,
}
