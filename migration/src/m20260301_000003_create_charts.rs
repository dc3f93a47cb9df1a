use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Charts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Charts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Charts::UserId).uuid().not_null())
                    .col(ColumnDef::new(Charts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Charts::Meta)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Charts::CreatedAt)
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
                    .name("idx_charts_user_kind")
                    .table(Charts::Table)
                    .col(Charts::UserId)
                    .col(Charts::Kind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Charts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Charts {
    Table,
    Id,
    UserId,
    Kind,
    Meta,
    CreatedAt,
}
