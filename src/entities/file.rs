use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One stored blob plus its place in a version lineage. For any
/// `(project_id, target_location, file_name)` at most one row carries
/// `is_current_version = true`; older rows are flagged off and snapshotted
/// into `file_versions` when superseded.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: Option<i32>,
    pub author_id: i32,
    #[sea_orm(unique)]
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub title: Option<String>,
    pub comments: Option<String>,
    pub bucket_name: String,
    pub target_location: String,
    pub target_id: Option<i32>,
    pub version_number: i32,
    pub previous_version_id: Option<i32>,
    pub is_current_version: bool,
    /// Nullable for rows created before the flag existed; null reads as public.
    pub is_private: Option<bool>,
    pub checked_out_by: Option<i32>,
    pub checked_out_at: Option<DateTime>,
    pub assigned_to: Option<i32>,
    pub assigned_at: Option<DateTime>,
    pub checkout_notes: Option<String>,
    pub uploaded_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
