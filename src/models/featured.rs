use serde::{Deserialize, Serialize};

use crate::entities::file;

/// Display snapshot of a project's featured file, cached on the project row
/// for fast reads. Bucket/path are kept so a fresh signed URL can always be
/// minted; any cached URL would expire and is never stored.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FeaturedImageData {
    pub id: i32,
    pub file_name: String,
    pub file_path: String,
    pub bucket_name: String,
    pub file_type: String,
    pub title: Option<String>,
}

impl From<&file::Model> for FeaturedImageData {
    fn from(model: &file::Model) -> Self {
        Self {
            id: model.id,
            file_name: model.file_name.clone(),
            file_path: model.file_path.clone(),
            bucket_name: model.bucket_name.clone(),
            file_type: model.file_type.clone(),
            title: model.title.clone(),
        }
    }
}
