use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No FK to users: deleting an account leaves its uploads behind.
        manager
            .create_table(
                Table::create()
                    .table(Uploads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Uploads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Uploads::Filename).string().not_null())
                    .col(ColumnDef::new(Uploads::StoredName).string().not_null())
                    .col(ColumnDef::new(Uploads::Path).string().not_null())
                    .col(
                        ColumnDef::new(Uploads::SizeBytes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Uploads::Status)
                            .string()
                            .not_null()
                            .default("Processing"),
                    )
                    .col(ColumnDef::new(Uploads::UploadedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Uploads::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Uploads::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploads_owner_created")
                    .table(Uploads::Table)
                    .col(Uploads::UploadedBy)
                    .col(Uploads::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Uploads::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Uploads {
    Table,
    Id,
    Filename,
    StoredName,
    Path,
    SizeBytes,
    Status,
    UploadedBy,
    CreatedAt,
    UpdatedAt,
}
