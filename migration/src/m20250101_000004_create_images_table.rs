use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Image::Images)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Image::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Image::Filename).string_len(255).not_null().unique_key())
                    .col(ColumnDef::new(Image::OriginalFilename).string_len(255).not_null())
                    .col(ColumnDef::new(Image::FilePath).string_len(500).not_null())
                    .col(ColumnDef::new(Image::ThumbnailPath).string_len(500).not_null())
                    .col(ColumnDef::new(Image::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(Image::MimeType).string_len(100).not_null())
                    .col(ColumnDef::new(Image::Width).integer().not_null())
                    .col(ColumnDef::new(Image::Height).integer().not_null())
                    .col(ColumnDef::new(Image::EntityType).string_len(50).not_null())
                    // Weak reference to products/categories, no foreign key.
                    .col(ColumnDef::new(Image::EntityId).integer())
                    .col(ColumnDef::new(Image::AltText).string_len(255))
                    .col(ColumnDef::new(Image::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Image::UploadedBy).integer().not_null())
                    .col(ColumnDef::new(Image::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Image::UpdatedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_uploaded_by")
                            .from(Image::Images, Image::UploadedBy)
                            .to(User::Users, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_images_entity")
                    .table(Image::Images)
                    .col(Image::EntityType)
                    .col(Image::EntityId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Image::Images).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Image {
    Images,
    Id,
    Filename,
    OriginalFilename,
    FilePath,
    ThumbnailPath,
    FileSize,
    MimeType,
    Width,
    Height,
    EntityType,
    EntityId,
    AltText,
    IsActive,
    UploadedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum User {
    Users,
    Id,
}
