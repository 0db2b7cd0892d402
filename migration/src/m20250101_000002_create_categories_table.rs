use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Category::Categories)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Category::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Category::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Category::Description).text())
                    .col(ColumnDef::new(Category::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Category::UpdatedAt).timestamp())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Category::Categories).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Category {
    Categories,
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}
