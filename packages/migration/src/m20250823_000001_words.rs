use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::{ColumnDef, Index, Table};

#[derive(DeriveMigrationName)]
pub struct Migration;

// ----- Iden enums for tables & columns -----
#[derive(Iden)]
enum Words {
    Table,
    Id,
    Text,
    Plays,
    Wins,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Words::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Words::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Words::Text).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(Words::Plays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Words::Wins).integer().not_null().default(0))
                    .to_owned(),
            )
            .await?;

        // next_word orders by play count on every turn
        manager
            .create_index(
                Index::create()
                    .name("idx_words_plays")
                    .table(Words::Table)
                    .col(Words::Plays)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_words_plays")
                    .table(Words::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Words::Table).to_owned())
            .await
    }
}
