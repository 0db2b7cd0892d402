use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub thumbnail_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    pub entity_type: EntityType,
    pub entity_id: Option<i32>,
    pub alt_text: Option<String>,
    pub is_active: bool,
    pub uploaded_by: i32,
    pub created_at: DateTime,
    pub updated_at: Option<DateTime>,
}

impl Model {
    pub fn url(&self) -> String {
        format!("/api/images/{}/{}", self.entity_type.as_str(), self.filename)
    }

    pub fn thumbnail_url(&self) -> String {
        format!("/api/images/{}/thumb_{}", self.entity_type.as_str(), self.filename)
    }
}

/// Owning-record category an image can be attached to.
#[derive(
    EnumIter,
    DeriveActiveEnum,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[sea_orm(string_value = "products")]
    Products,
    #[sea_orm(string_value = "categories")]
    Categories,
    #[sea_orm(string_value = "banners")]
    Banners,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::Products,
        EntityType::Categories,
        EntityType::Banners,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Products => "products",
            EntityType::Categories => "categories",
            EntityType::Banners => "banners",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploadedBy",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
