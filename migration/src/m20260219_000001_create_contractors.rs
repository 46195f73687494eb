use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contractor::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contractor::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contractor::Name).string().not_null())
                    .col(
                        ColumnDef::new(Contractor::Slug)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Contractor::Email).string().null())
                    .col(ColumnDef::new(Contractor::Phone).string().null())
                    .col(ColumnDef::new(Contractor::Website).string().null())
                    .col(ColumnDef::new(Contractor::Address).string().null())
                    .col(ColumnDef::new(Contractor::City).string().null())
                    .col(ColumnDef::new(Contractor::State).string().null())
                    .col(ColumnDef::new(Contractor::Rating).double().null())
                    .col(ColumnDef::new(Contractor::ReviewCount).integer().null())
                    // NULLs never collide, so unscraped rows can omit it.
                    .col(
                        ColumnDef::new(Contractor::PlaceId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Contractor::Status)
                            .string_len(16)
                            .not_null()
                            .default("prospect"),
                    )
                    .col(ColumnDef::new(Contractor::Notes).text().null())
                    .col(
                        ColumnDef::new(Contractor::LastContactedDate)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contractor::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Contractor::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Contractor::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Contractor {
    Table,
    Id,
    Name,
    Slug,
    Email,
    Phone,
    Website,
    Address,
    City,
    State,
    Rating,
    ReviewCount,
    PlaceId,
    Status,
    Notes,
    LastContactedDate,
    CreatedAt,
    UpdatedAt,
}
