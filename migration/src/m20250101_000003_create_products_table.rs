use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Product::Products)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Product::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Product::Name).string().not_null())
                    .col(ColumnDef::new(Product::Description).text())
                    .col(ColumnDef::new(Product::Price).double().not_null())
                    // Denormalized label, not a foreign key to categories.
                    .col(ColumnDef::new(Product::Category).string())
                    .col(ColumnDef::new(Product::ImageUrl).string())
                    .col(ColumnDef::new(Product::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Product::UpdatedAt).timestamp())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Product::Products).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Product {
    Products,
    Id,
    Name,
    Description,
    Price,
    Category,
    ImageUrl,
    CreatedAt,
    UpdatedAt,
}
