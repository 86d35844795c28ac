use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, Value,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::{file, file_version, profile, project};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::featured::FeaturedImageData;
use crate::services::s3::BlobStore;
use crate::services::storage_path::{resolve_path_prefix, TargetLocation};
use crate::services::uploader::{generate_object_key, BlobUploader, MediaData};
use crate::services::visibility::{is_private_for_status, visible_to};

/// Signed URLs embed time-limited access tokens; they are minted per
/// response and never persisted.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct SaveMediaRequest {
    pub media_data: MediaData,
    pub file_name: String,
    pub file_type: String,
    pub project_id: Option<i32>,
    pub target_location: TargetLocation,
    pub target_id: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub custom_version_number: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SavedMedia {
    pub id: i32,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub bucket_name: String,
    pub public_url: Option<String>,
    pub target_location: String,
    pub target_id: Option<i32>,
    pub file_size: i64,
    pub version_number: i32,
    pub previous_version_id: Option<i32>,
    pub uploaded_at: chrono::NaiveDateTime,
    pub title: Option<String>,
    pub comments: Option<String>,
}

impl SavedMedia {
    fn from_model(model: file::Model, public_url: Option<String>) -> Self {
        Self {
            id: model.id,
            file_name: model.file_name,
            file_path: model.file_path,
            file_type: model.file_type,
            bucket_name: model.bucket_name,
            public_url,
            target_location: model.target_location,
            target_id: model.target_id,
            file_size: model.file_size,
            version_number: model.version_number,
            previous_version_id: model.previous_version_id,
            uploaded_at: model.uploaded_at,
            title: model.title,
            comments: model.comments,
        }
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct GetMediaRequest {
    pub project_id: Option<i32>,
    pub target_location: Option<TargetLocation>,
    pub target_id: Option<i32>,
    pub file_id: Option<i32>,
    /// `featuredImage` selects the featured-image request shape.
    pub media_type: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaItem {
    pub id: i32,
    pub project_id: Option<i32>,
    pub file_name: String,
    pub file_path: String,
    pub bucket_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub title: Option<String>,
    pub comments: Option<String>,
    pub target_location: String,
    pub target_id: Option<i32>,
    pub version_number: i32,
    pub previous_version_id: Option<i32>,
    pub is_current_version: bool,
    pub is_private: Option<bool>,
    pub is_featured: bool,
    pub public_url: Option<String>,
    pub uploaded_by: Option<String>,
    pub assigned_to_name: Option<String>,
    pub checked_out_by_name: Option<String>,
    pub checkout_notes: Option<String>,
    pub assigned_at: Option<chrono::NaiveDateTime>,
    pub checked_out_at: Option<chrono::NaiveDateTime>,
    pub uploaded_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl MediaItem {
    fn build(
        model: file::Model,
        featured_image_id: Option<i32>,
        names: &HashMap<i32, String>,
        public_url: Option<String>,
    ) -> Self {
        Self {
            is_featured: featured_image_id == Some(model.id),
            uploaded_by: names.get(&model.author_id).cloned(),
            assigned_to_name: model.assigned_to.and_then(|id| names.get(&id).cloned()),
            checked_out_by_name: model.checked_out_by.and_then(|id| names.get(&id).cloned()),
            id: model.id,
            project_id: model.project_id,
            file_name: model.file_name,
            file_path: model.file_path,
            bucket_name: model.bucket_name,
            file_type: model.file_type,
            file_size: model.file_size,
            title: model.title,
            comments: model.comments,
            target_location: model.target_location,
            target_id: model.target_id,
            version_number: model.version_number,
            previous_version_id: model.previous_version_id,
            is_current_version: model.is_current_version,
            is_private: model.is_private,
            checkout_notes: model.checkout_notes,
            assigned_at: model.assigned_at,
            checked_out_at: model.checked_out_at,
            uploaded_at: model.uploaded_at,
            updated_at: model.updated_at,
            public_url,
        }
    }
}

/// Featured-image reads are served from the denormalized snapshot when it is
/// available, so they carry the snapshot's fields rather than a full row.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FeaturedMediaView {
    pub id: i32,
    pub file_name: String,
    pub file_path: String,
    pub bucket_name: String,
    pub file_type: String,
    pub title: Option<String>,
    pub public_url: Option<String>,
}

impl FeaturedMediaView {
    fn from_snapshot(data: FeaturedImageData, public_url: Option<String>) -> Self {
        Self {
            id: data.id,
            file_name: data.file_name,
            file_path: data.file_path,
            bucket_name: data.bucket_name,
            file_type: data.file_type,
            title: data.title,
            public_url,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum MediaResult {
    One(Box<MediaItem>),
    Many(Vec<MediaItem>),
    Featured(FeaturedMediaView),
    None,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaQueryResult {
    pub success: bool,
    /// A single file, a file list, a featured-image view, or null.
    #[schema(value_type = Object)]
    pub media: MediaResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub message: String,
}

impl MediaQueryResult {
    fn none(message: &str) -> Self {
        Self {
            success: true,
            media: MediaResult::None,
            count: None,
            message: message.to_string(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeletedFileInfo {
    pub id: i32,
    pub file_name: String,
    pub file_path: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteMediaResult {
    pub success: bool,
    pub message: String,
    pub deleted_file: DeletedFileInfo,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FeaturedUpdateResult {
    pub success: bool,
    pub message: String,
}

struct VersionDecision {
    version_number: i32,
    previous_version_id: Option<i32>,
}

/// Pure version decision: a caller-supplied number wins outright (externally
/// managed documents), an existing current row is superseded, anything else
/// starts a fresh lineage at 1.
fn next_version(existing: Option<&file::Model>, custom: Option<i32>) -> VersionDecision {
    if let Some(version) = custom {
        return VersionDecision {
            version_number: version,
            previous_version_id: None,
        };
    }
    match existing {
        Some(current) => VersionDecision {
            version_number: current.version_number + 1,
            previous_version_id: Some(current.id),
        },
        None => VersionDecision {
            version_number: 1,
            previous_version_id: None,
        },
    }
}

pub struct MediaService {
    db: DatabaseConnection,
    store: Arc<dyn BlobStore>,
}

impl MediaService {
    pub fn new(db: DatabaseConnection, store: Arc<dyn BlobStore>) -> Self {
        Self { db, store }
    }

    /// Decode payload, route the storage path, resolve the version (archiving
    /// any superseded row), upload, then insert metadata. The blob always
    /// exists before the row that references it.
    pub async fn save_media(
        &self,
        req: SaveMediaRequest,
        current_user: &AuthUser,
    ) -> Result<SavedMedia, AppError> {
        let (bytes, detected_mime) = req.media_data.decode()?;
        let file_type = detected_mime.unwrap_or(req.file_type);
        let file_size = bytes.len() as i64;

        let bucket = self.store.default_bucket().to_string();
        let prefix = resolve_path_prefix(
            req.target_location,
            req.project_id,
            req.target_id,
            Some(current_user.id),
        );

        let decision = self
            .resolve_version(
                req.project_id,
                req.target_location,
                &req.file_name,
                req.custom_version_number,
            )
            .await?;

        let key = generate_object_key(&prefix, &req.file_name);
        BlobUploader::new(self.store.as_ref())
            .upload(&bucket, &key, bytes, &file_type)
            .await?;

        let is_private = match req.project_id {
            Some(project_id) => self.private_by_project_status(project_id).await,
            None => false,
        };

        let now = chrono::Utc::now().naive_utc();
        let record = file::ActiveModel {
            project_id: Set(req.project_id),
            author_id: Set(current_user.id),
            file_path: Set(key.clone()),
            file_name: Set(req.file_name),
            file_size: Set(file_size),
            file_type: Set(file_type),
            title: Set(req.title),
            comments: Set(req.description),
            bucket_name: Set(bucket.clone()),
            target_location: Set(req.target_location.as_str().to_string()),
            target_id: Set(req.target_id),
            version_number: Set(decision.version_number),
            previous_version_id: Set(decision.previous_version_id),
            is_current_version: Set(true),
            is_private: Set(Some(is_private)),
            uploaded_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let saved = record.insert(&self.db).await?;

        let public_url = self.mint_url(&bucket, &key).await;

        info!(
            "Media | save | file={} version={} path={} by={}",
            saved.file_name, saved.version_number, saved.file_path, current_user.username
        );
        Ok(SavedMedia::from_model(saved, public_url))
    }

    pub async fn get_media(
        &self,
        req: GetMediaRequest,
        current_user: &AuthUser,
    ) -> Result<MediaQueryResult, AppError> {
        if req.media_type.as_deref() == Some("featuredImage") {
            let project_id = req.project_id.ok_or_else(|| {
                AppError::BadRequest("projectId is required for featured image requests".to_string())
            })?;
            return self.get_featured_image(project_id).await;
        }

        if let Some(file_id) = req.file_id {
            return self.get_single_file(file_id, current_user).await;
        }

        if let Some(project_id) = req.project_id {
            return self
                .get_project_media(project_id, req.target_location, req.target_id, current_user)
                .await;
        }

        Err(AppError::BadRequest(
            "Provide fileId, projectId, or mediaType=featuredImage".to_string(),
        ))
    }

    /// Look up the file, remove its blob (best effort), delete the row, and
    /// clear any featured pointer that referenced it. Storage failures never
    /// block metadata cleanup; a dangling row is user-visible while an
    /// orphaned blob is not.
    pub async fn delete_media(
        &self,
        file_id: i32,
        current_user: &AuthUser,
    ) -> Result<DeleteMediaResult, AppError> {
        let target = file::Entity::find_by_id(file_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if let Err(e) = self
            .store
            .remove_objects(&target.bucket_name, std::slice::from_ref(&target.file_path))
            .await
        {
            warn!(
                "Storage removal failed for {}; continuing with metadata delete: {}",
                target.file_path, e
            );
        }

        let result = file::Entity::delete_by_id(target.id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        if let Some(project_id) = target.project_id {
            let featured = project::Entity::find_by_id(project_id)
                .one(&self.db)
                .await?
                .and_then(|p| p.featured_image_id);
            if featured == Some(target.id) {
                self.clear_featured_pointer(project_id).await?;
            }
        }

        info!(
            "Media | delete | id={} path={} by={}",
            target.id, target.file_path, current_user.username
        );
        Ok(DeleteMediaResult {
            success: true,
            message: "File deleted successfully".to_string(),
            deleted_file: DeletedFileInfo {
                id: target.id,
                file_name: target.file_name,
                file_path: target.file_path,
            },
        })
    }

    /// Set or clear a project's featured-image pointer. The referenced file
    /// is not validated here; the next read reconciles a stale pointer. The
    /// display cache is cleared on every pointer change and repopulated
    /// read-through.
    pub async fn update_featured_image(
        &self,
        project_id: i32,
        file_id: Option<i32>,
        is_active: bool,
    ) -> Result<FeaturedUpdateResult, AppError> {
        let update = if is_active {
            let file_id = file_id.ok_or_else(|| {
                AppError::BadRequest("fileId is required when setting a featured image".to_string())
            })?;
            project::Entity::update_many()
                .col_expr(project::Column::FeaturedImageId, Expr::value(Some(file_id)))
                .col_expr(project::Column::FeaturedImageData, Expr::value(Value::Json(None)))
        } else {
            project::Entity::update_many()
                .col_expr(project::Column::FeaturedImageId, Expr::value(Value::Int(None)))
                .col_expr(project::Column::FeaturedImageData, Expr::value(Value::Json(None)))
        };

        let result = update
            .col_expr(
                project::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(project::Column::Id.eq(project_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Project not found".to_string()));
        }

        Ok(FeaturedUpdateResult {
            success: true,
            message: if is_active {
                "Featured image updated".to_string()
            } else {
                "Featured image cleared".to_string()
            },
        })
    }

    // ---- internals -------------------------------------------------------

    /// Decide the next version number, archiving the superseded row first. A
    /// lookup failure other than "no rows" degrades to a fresh version rather
    /// than failing the upload.
    async fn resolve_version(
        &self,
        project_id: Option<i32>,
        location: TargetLocation,
        file_name: &str,
        custom_version_number: Option<i32>,
    ) -> Result<VersionDecision, AppError> {
        // Externally numbered documents skip the supersede machinery.
        if custom_version_number.is_some() {
            return Ok(next_version(None, custom_version_number));
        }
        let Some(project_id) = project_id else {
            return Ok(next_version(None, None));
        };

        let existing = match file::Entity::find()
            .filter(file::Column::ProjectId.eq(project_id))
            .filter(file::Column::TargetLocation.eq(location.as_str()))
            .filter(file::Column::FileName.eq(file_name))
            .filter(file::Column::IsCurrentVersion.eq(true))
            .one(&self.db)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Current-version lookup failed for {}; treating upload as version 1: {}",
                    file_name, e
                );
                None
            }
        };

        if let Some(current) = &existing {
            self.archive_superseded(current).await?;
        }

        Ok(next_version(existing.as_ref(), None))
    }

    /// Snapshot the superseded row into `file_versions`, then flag it
    /// non-current. Losing this snapshot is a data-integrity defect, so
    /// failures here abort the save.
    async fn archive_superseded(&self, current: &file::Model) -> Result<(), AppError> {
        let snapshot = file_version::ActiveModel {
            file_id: Set(current.id),
            version_number: Set(current.version_number),
            file_path: Set(current.file_path.clone()),
            file_size: Set(current.file_size),
            file_type: Set(current.file_type.clone()),
            uploaded_by: Set(current.author_id),
            notes: Set(current.comments.clone()),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };
        snapshot.insert(&self.db).await?;

        file::Entity::update_many()
            .col_expr(file::Column::IsCurrentVersion, Expr::value(false))
            .col_expr(
                file::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(file::Column::Id.eq(current.id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Write-time privacy: fails open to public when the status lookup
    /// misbehaves, because hiding a file from its own uploader is worse than
    /// the privacy miss.
    async fn private_by_project_status(&self, project_id: i32) -> bool {
        match project::Entity::find_by_id(project_id).one(&self.db).await {
            Ok(Some(project)) => is_private_for_status(project.status),
            Ok(None) => {
                warn!(
                    "Project {} not found during privacy resolution; defaulting to public",
                    project_id
                );
                false
            }
            Err(e) => {
                warn!(
                    "Project status lookup failed for {}; defaulting to public: {}",
                    project_id, e
                );
                false
            }
        }
    }

    async fn get_featured_image(&self, project_id: i32) -> Result<MediaQueryResult, AppError> {
        let project = project::Entity::find_by_id(project_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        // Fast path: the denormalized snapshot with a freshly minted URL.
        if let Some(raw) = &project.featured_image_data {
            match serde_json::from_value::<FeaturedImageData>(raw.clone()) {
                Ok(cache) => {
                    let public_url = self.mint_url(&cache.bucket_name, &cache.file_path).await;
                    return Ok(MediaQueryResult {
                        success: true,
                        media: MediaResult::Featured(FeaturedMediaView::from_snapshot(
                            cache, public_url,
                        )),
                        count: None,
                        message: "Featured image retrieved".to_string(),
                    });
                }
                Err(e) => warn!(
                    "Unreadable featured image cache for project {}: {}",
                    project_id, e
                ),
            }
        }

        let Some(featured_id) = project.featured_image_id else {
            // "No featured image" is a valid, expected state.
            return Ok(MediaQueryResult::none("Project has no featured image"));
        };

        let Some(target) = file::Entity::find_by_id(featured_id).one(&self.db).await? else {
            // Stale pointer: updateFeaturedImage never validates, reads clean up.
            if let Err(e) = self.clear_featured_pointer(project_id).await {
                warn!(
                    "Failed to clear stale featured pointer on project {}: {}",
                    project_id, e
                );
            }
            return Ok(MediaQueryResult::none("Project has no featured image"));
        };

        // Repopulate the read-through cache for the next featured read.
        let snapshot = FeaturedImageData::from(&target);
        let cache_update = project::Entity::update_many()
            .col_expr(
                project::Column::FeaturedImageData,
                Expr::value(serde_json::to_value(&snapshot).ok()),
            )
            .filter(project::Column::Id.eq(project_id))
            .exec(&self.db)
            .await;
        if let Err(e) = cache_update {
            warn!(
                "Failed to refresh featured image cache for project {}: {}",
                project_id, e
            );
        }

        let public_url = self.mint_url(&target.bucket_name, &target.file_path).await;
        Ok(MediaQueryResult {
            success: true,
            media: MediaResult::Featured(FeaturedMediaView::from_snapshot(snapshot, public_url)),
            count: None,
            message: "Featured image retrieved".to_string(),
        })
    }

    async fn get_single_file(
        &self,
        file_id: i32,
        current_user: &AuthUser,
    ) -> Result<MediaQueryResult, AppError> {
        let target = file::Entity::find_by_id(file_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        // Clients never see private files; report not-found rather than leak
        // the row's existence.
        if !visible_to(target.is_private, current_user.role) {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        match self
            .store
            .object_exists(&target.bucket_name, &target.file_path)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("Media | pruning orphaned file {} during read", target.id);
                self.prune_orphan(&target).await;
                return Err(AppError::NotFound("File not found".to_string()));
            }
            // Absence must be a confirmed negative before deletion.
            Err(e) => warn!(
                "Existence check failed for {}; keeping record: {}",
                target.file_path, e
            ),
        }

        let featured_image_id = match target.project_id {
            Some(project_id) => project::Entity::find_by_id(project_id)
                .one(&self.db)
                .await?
                .and_then(|p| p.featured_image_id),
            None => None,
        };

        let mut names = HashMap::new();
        if let Some(uploader) = profile::Entity::find_by_id(target.author_id)
            .one(&self.db)
            .await?
        {
            names.insert(uploader.id, uploader.display_name());
        }

        let public_url = self.mint_url(&target.bucket_name, &target.file_path).await;
        let item = MediaItem::build(target, featured_image_id, &names, public_url);

        Ok(MediaQueryResult {
            success: true,
            media: MediaResult::One(Box::new(item)),
            count: None,
            message: "File retrieved".to_string(),
        })
    }

    async fn get_project_media(
        &self,
        project_id: i32,
        target_location: Option<TargetLocation>,
        target_id: Option<i32>,
        current_user: &AuthUser,
    ) -> Result<MediaQueryResult, AppError> {
        let mut query = file::Entity::find().filter(file::Column::ProjectId.eq(project_id));
        if let Some(location) = target_location {
            query = query.filter(file::Column::TargetLocation.eq(location.as_str()));
        }
        if let Some(target) = target_id {
            query = query.filter(file::Column::TargetId.eq(target));
        }
        if !current_user.role.can_view_private() {
            // Null predates the flag and reads as public.
            query = query.filter(
                Condition::any()
                    .add(file::Column::IsPrivate.eq(false))
                    .add(file::Column::IsPrivate.is_null()),
            );
        }

        let files = query
            .order_by_desc(file::Column::UploadedAt)
            .all(&self.db)
            .await?;

        let mut featured_image_id = project::Entity::find_by_id(project_id)
            .one(&self.db)
            .await?
            .and_then(|p| p.featured_image_id);

        // One concurrent probe + URL-mint batch across the page, bounded by
        // the result-set size.
        let probes = join_all(files.iter().map(|f| async move {
            match self
                .store
                .object_exists(&f.bucket_name, &f.file_path)
                .await
            {
                Ok(false) => (false, None),
                Ok(true) => (true, self.mint_url(&f.bucket_name, &f.file_path).await),
                Err(e) => {
                    warn!(
                        "Existence check failed for {}; keeping record: {}",
                        f.file_path, e
                    );
                    (true, self.mint_url(&f.bucket_name, &f.file_path).await)
                }
            }
        }))
        .await;

        let mut kept = Vec::with_capacity(files.len());
        let mut orphans = Vec::new();
        for (model, (keep, url)) in files.into_iter().zip(probes) {
            if keep {
                kept.push((model, url));
            } else {
                orphans.push(model);
            }
        }

        for orphan in &orphans {
            info!("Media | pruning orphaned file {} during read", orphan.id);
            if let Err(e) = file::Entity::delete_by_id(orphan.id).exec(&self.db).await {
                warn!("Failed to prune orphaned file {}: {}", orphan.id, e);
                continue;
            }
            if featured_image_id == Some(orphan.id) {
                if let Err(e) = self.clear_featured_pointer(project_id).await {
                    warn!(
                        "Failed to clear featured pointer for pruned file {}: {}",
                        orphan.id, e
                    );
                }
                featured_image_id = None;
            }
        }

        let mut profile_ids: Vec<i32> = kept
            .iter()
            .flat_map(|(f, _)| [Some(f.author_id), f.assigned_to, f.checked_out_by])
            .flatten()
            .collect();
        profile_ids.sort_unstable();
        profile_ids.dedup();

        let names: HashMap<i32, String> = if profile_ids.is_empty() {
            HashMap::new()
        } else {
            profile::Entity::find()
                .filter(profile::Column::Id.is_in(profile_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p.display_name()))
                .collect()
        };

        let items: Vec<MediaItem> = kept
            .into_iter()
            .map(|(model, url)| MediaItem::build(model, featured_image_id, &names, url))
            .collect();

        let count = items.len();
        Ok(MediaQueryResult {
            success: true,
            media: MediaResult::Many(items),
            count: Some(count),
            message: format!("Found {} files", count),
        })
    }

    /// Remove a metadata row whose blob is confirmed missing. Best effort:
    /// read paths must not fail because housekeeping did.
    async fn prune_orphan(&self, orphan: &file::Model) {
        let featured_id = match orphan.project_id {
            Some(project_id) => match project::Entity::find_by_id(project_id).one(&self.db).await {
                Ok(project) => project.and_then(|p| p.featured_image_id),
                Err(e) => {
                    warn!(
                        "Project lookup failed while pruning file {}: {}",
                        orphan.id, e
                    );
                    None
                }
            },
            None => None,
        };

        if let Err(e) = file::Entity::delete_by_id(orphan.id).exec(&self.db).await {
            warn!("Failed to prune orphaned file {}: {}", orphan.id, e);
            return;
        }

        if let (Some(project_id), true) = (orphan.project_id, featured_id == Some(orphan.id)) {
            if let Err(e) = self.clear_featured_pointer(project_id).await {
                warn!(
                    "Failed to clear featured pointer for pruned file {}: {}",
                    orphan.id, e
                );
            }
        }
    }

    async fn clear_featured_pointer(&self, project_id: i32) -> Result<(), AppError> {
        project::Entity::update_many()
            .col_expr(project::Column::FeaturedImageId, Expr::value(Value::Int(None)))
            .col_expr(project::Column::FeaturedImageData, Expr::value(Value::Json(None)))
            .col_expr(
                project::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(project::Column::Id.eq(project_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn mint_url(&self, bucket: &str, key: &str) -> Option<String> {
        match self.store.get_presigned_url(bucket, key, SIGNED_URL_TTL).await {
            Ok(url) => Some(url),
            Err(e) => {
                // URL is nice-to-have; the record stays valid without one.
                warn!("Signed URL mint failed for {}: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::profile::Role;
    use crate::services::testing::MemoryBlobStore;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::atomic::Ordering;

    fn now() -> chrono::NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    fn staff_user() -> AuthUser {
        AuthUser {
            id: 7,
            username: "amber".to_string(),
            role: Role::Staff,
        }
    }

    fn client_user() -> AuthUser {
        AuthUser {
            id: 9,
            username: "client".to_string(),
            role: Role::Client,
        }
    }

    fn make_file(id: i32, version: i32) -> file::Model {
        file::Model {
            id,
            project_id: Some(42),
            author_id: 7,
            file_path: format!("42/documents/170000000000{}-plan.pdf", id),
            file_name: "plan.pdf".to_string(),
            file_size: 5,
            file_type: "application/pdf".to_string(),
            title: None,
            comments: None,
            bucket_name: "project-media".to_string(),
            target_location: "documents".to_string(),
            target_id: None,
            version_number: version,
            previous_version_id: if version > 1 { Some(id - 1) } else { None },
            is_current_version: true,
            is_private: Some(false),
            checked_out_by: None,
            checked_out_at: None,
            assigned_to: None,
            assigned_at: None,
            checkout_notes: None,
            uploaded_at: now(),
            updated_at: now(),
        }
    }

    fn make_project(featured_image_id: Option<i32>) -> project::Model {
        project::Model {
            id: 42,
            owner_id: 1,
            name: "Warehouse sprinkler retrofit".to_string(),
            description: None,
            status: 10,
            featured_image_id,
            featured_image_data: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn make_profile(id: i32) -> profile::Model {
        profile::Model {
            id,
            username: "amber".to_string(),
            password: "hash".to_string(),
            first_name: Some("Amber".to_string()),
            last_name: Some("Ruiz".to_string()),
            email: Some("amber@example.com".to_string()),
            role: Role::Staff,
            created_at: now(),
        }
    }

    fn make_version_row(file_id: i32, version: i32) -> file_version::Model {
        file_version::Model {
            id: 1,
            file_id,
            version_number: version,
            file_path: format!("42/documents/170000000000{}-plan.pdf", file_id),
            file_size: 5,
            file_type: "application/pdf".to_string(),
            uploaded_by: 7,
            notes: None,
            created_at: now(),
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 1,
            rows_affected: 1,
        }
    }

    /// Render the transaction log with identifier quoting stripped of Debug
    /// escapes, so assertions can match `INSERT INTO "files"` literally.
    fn logged_sql(db: DatabaseConnection) -> String {
        format!("{:?}", db.into_transaction_log()).replace('\\', "")
    }

    fn save_request(
        project_id: Option<i32>,
        custom_version_number: Option<i32>,
    ) -> SaveMediaRequest {
        SaveMediaRequest {
            media_data: MediaData::DataUri("data:application/pdf;base64,aGVsbG8=".to_string()),
            file_name: "plan.pdf".to_string(),
            file_type: "application/octet-stream".to_string(),
            project_id,
            target_location: TargetLocation::Documents,
            target_id: None,
            title: None,
            description: None,
            custom_version_number,
        }
    }

    #[test]
    fn next_version_starts_at_one() {
        let decision = next_version(None, None);
        assert_eq!(decision.version_number, 1);
        assert_eq!(decision.previous_version_id, None);
    }

    #[test]
    fn next_version_increments_and_links_previous() {
        let existing = make_file(3, 4);
        let decision = next_version(Some(&existing), None);
        assert_eq!(decision.version_number, 5);
        assert_eq!(decision.previous_version_id, Some(3));
    }

    #[test]
    fn custom_version_wins_over_existing() {
        let existing = make_file(3, 4);
        let decision = next_version(Some(&existing), Some(999));
        assert_eq!(decision.version_number, 999);
        assert_eq!(decision.previous_version_id, None);
    }

    #[tokio::test]
    async fn save_media_first_version_uploads_then_inserts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<file::Model>::new()]) // current-version lookup
            .append_query_results([vec![make_project(None)]]) // privacy status
            .append_query_results([vec![make_file(1, 1)]]) // insert returning
            .append_exec_results(vec![exec_ok(); 2])
            .into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        let service = MediaService::new(db, store.clone());

        let saved = service
            .save_media(save_request(Some(42), None), &staff_user())
            .await
            .unwrap();

        assert_eq!(saved.version_number, 1);
        assert_eq!(saved.previous_version_id, None);
        assert!(saved.public_url.is_some());
        assert_eq!(saved.bucket_name, "project-media");

        // The blob landed under the routed prefix.
        let objects = store.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        let key = objects.keys().next().unwrap();
        assert!(key.starts_with("project-media/42/documents/"));
        assert!(key.ends_with("-plan.pdf"));
        drop(objects);

        // Data-URI MIME type wins over the declared one.
        let log = logged_sql(service.db);
        assert!(log.contains("application/pdf"));
        assert!(!log.contains("application/octet-stream"));
    }

    #[tokio::test]
    async fn save_media_supersede_archives_before_inserting() {
        let existing = make_file(1, 1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]]) // current-version lookup
            .append_query_results([vec![make_version_row(1, 1)]]) // archive insert
            .append_query_results([vec![make_project(None)]]) // privacy status
            .append_query_results([vec![{
                let mut v2 = make_file(2, 2);
                v2.previous_version_id = Some(1);
                v2
            }]]) // insert returning
            .append_exec_results(vec![exec_ok(); 3])
            .into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        let service = MediaService::new(db, store);

        let saved = service
            .save_media(save_request(Some(42), None), &staff_user())
            .await
            .unwrap();

        assert_eq!(saved.version_number, 2);
        assert_eq!(saved.previous_version_id, Some(1));

        let log = logged_sql(service.db);
        let archive = log.find("INSERT INTO \"file_versions\"").unwrap();
        let flag_old = log.find("UPDATE \"files\"").unwrap();
        let insert_new = log.find("INSERT INTO \"files\"").unwrap();
        assert!(archive < flag_old, "archive must precede flagging the old row");
        assert!(flag_old < insert_new, "old row must be flagged before the new insert");
        // The snapshot carries the superseded row's path.
        assert!(log.contains(&existing.file_path));
    }

    #[tokio::test]
    async fn save_media_custom_version_skips_supersede() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_project(None)]]) // privacy status
            .append_query_results([vec![{
                let mut v = make_file(3, 999);
                v.previous_version_id = None;
                v
            }]]) // insert returning
            .append_exec_results(vec![exec_ok(); 2])
            .into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        let service = MediaService::new(db, store);

        let saved = service
            .save_media(save_request(Some(42), Some(999)), &staff_user())
            .await
            .unwrap();

        assert_eq!(saved.version_number, 999);
        assert_eq!(saved.previous_version_id, None);

        let log = logged_sql(service.db);
        assert!(!log.contains("file_versions"));
        assert!(!log.contains("UPDATE \"files\""));
        // No current-version lookup happened either.
        assert!(!log.contains("FROM \"files\""));
    }

    #[tokio::test(start_paused = true)]
    async fn save_media_never_inserts_after_failed_upload() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        store.fail_uploads.store(true, Ordering::SeqCst);
        let service = MediaService::new(db, store.clone());

        let result = service
            .save_media(save_request(None, None), &staff_user())
            .await;

        assert!(matches!(result, Err(AppError::StorageError(_))));
        assert_eq!(store.upload_attempts.load(Ordering::SeqCst), 3);

        let log = service.db.into_transaction_log();
        assert!(log.is_empty(), "no statement may run after a failed upload");
    }

    #[tokio::test]
    async fn save_media_marks_private_past_proposal_stage() {
        let mut project = make_project(None);
        project.status = 40;
        let mut private_file = make_file(4, 1);
        private_file.is_private = Some(true);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<file::Model>::new()])
            .append_query_results([vec![project]])
            .append_query_results([vec![private_file]])
            .append_exec_results(vec![exec_ok(); 2])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        service
            .save_media(save_request(Some(42), None), &staff_user())
            .await
            .unwrap();

        let log = logged_sql(service.db);
        let insert = log.find("INSERT INTO \"files\"").unwrap();
        // Two true booleans in the insert: is_current_version and is_private.
        assert_eq!(log[insert..].matches("Bool(Some(true))").count(), 2);
    }

    #[tokio::test]
    async fn project_list_prunes_orphans_and_clears_featured_pointer() {
        let kept = make_file(1, 1);
        let mut orphan = make_file(2, 1);
        orphan.file_name = "photo.jpg".to_string();
        orphan.file_path = "42/documents/1700000000002-photo.jpg".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![kept.clone(), orphan.clone()]])
            .append_query_results([vec![make_project(Some(2))]]) // featured = orphan
            .append_query_results([vec![make_profile(7)]])
            .append_exec_results(vec![exec_ok(); 2]) // prune delete + pointer clear
            .into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        store.seed("project-media", &kept.file_path, vec![1, 2, 3]);
        let service = MediaService::new(db, store);

        let result = service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await
            .unwrap();

        assert_eq!(result.count, Some(1));
        match result.media {
            MediaResult::Many(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].id, 1);
                assert!(!items[0].is_featured);
                assert_eq!(items[0].uploaded_by.as_deref(), Some("Amber Ruiz"));
                assert!(items[0].public_url.is_some());
            }
            _ => panic!("expected a list result"),
        }

        let log = logged_sql(service.db);
        assert!(log.contains("DELETE FROM \"files\""));
        assert!(log.contains("UPDATE \"projects\""));
    }

    #[tokio::test]
    async fn project_list_keeps_rows_when_probe_fails() {
        let file_row = make_file(1, 1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![file_row]])
            .append_query_results([vec![make_project(None)]])
            .append_query_results([vec![make_profile(7)]])
            .into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        store.fail_probes.store(true, Ordering::SeqCst);
        let service = MediaService::new(db, store);

        let result = service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await
            .unwrap();

        // A failed probe is not a confirmed negative; nothing is deleted.
        assert_eq!(result.count, Some(1));
        let log = logged_sql(service.db);
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn client_queries_filter_on_privacy_flag() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<file::Model>::new()])
            .append_query_results([vec![make_project(None)]])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    ..Default::default()
                },
                &client_user(),
            )
            .await
            .unwrap();

        assert_eq!(result.count, Some(0));
        let log = logged_sql(service.db);
        // The privacy condition is part of the query, not post-filtering.
        assert!(log.contains("\"is_private\" ="));
        assert!(log.contains("IS NULL"));
    }

    #[tokio::test]
    async fn staff_queries_do_not_filter_on_privacy_flag() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<file::Model>::new()])
            .append_query_results([vec![make_project(None)]])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await
            .unwrap();

        let log = logged_sql(service.db);
        assert!(!log.contains("\"is_private\" ="));
    }

    #[tokio::test]
    async fn single_private_file_is_hidden_from_clients() {
        let mut private_file = make_file(11, 1);
        private_file.is_private = Some(true);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![private_file]])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .get_media(
                GetMediaRequest {
                    file_id: Some(11),
                    ..Default::default()
                },
                &client_user(),
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn single_file_orphan_is_pruned_and_reported_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_file(9, 1)]])
            .append_query_results([vec![make_project(None)]])
            .append_exec_results(vec![exec_ok(); 1])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .get_media(
                GetMediaRequest {
                    file_id: Some(9),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        let log = logged_sql(service.db);
        assert!(log.contains("DELETE FROM \"files\""));
    }

    #[tokio::test]
    async fn delete_media_clears_featured_pointer_despite_storage_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_file(5, 1)]])
            .append_query_results([vec![make_project(Some(5))]])
            .append_exec_results(vec![exec_ok(); 2])
            .into_connection();
        let store = Arc::new(MemoryBlobStore::new());
        store.fail_removals.store(true, Ordering::SeqCst);
        let service = MediaService::new(db, store);

        let result = service.delete_media(5, &staff_user()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.deleted_file.id, 5);
        let log = logged_sql(service.db);
        assert!(log.contains("DELETE FROM \"files\""));
        // Both the pointer and the display cache are cleared.
        let update = log.find("UPDATE \"projects\"").unwrap();
        assert!(log[update..].contains("\"featured_image_id\""));
        assert!(log[update..].contains("\"featured_image_data\""));
    }

    #[tokio::test]
    async fn delete_media_missing_file_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<file::Model>::new()])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service.delete_media(404, &staff_user()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn featured_request_with_no_pointer_is_a_valid_empty_result() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_project(None)]])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    media_type: Some("featuredImage".to_string()),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(matches!(result.media, MediaResult::None));
    }

    #[tokio::test]
    async fn featured_request_serves_cache_without_touching_files() {
        let snapshot = FeaturedImageData {
            id: 3,
            file_name: "site.jpg".to_string(),
            file_path: "42/general/1700000000003-site.jpg".to_string(),
            bucket_name: "project-media".to_string(),
            file_type: "image/jpeg".to_string(),
            title: None,
        };
        let mut project = make_project(Some(3));
        project.featured_image_data = Some(serde_json::to_value(&snapshot).unwrap());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![project]])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    media_type: Some("featuredImage".to_string()),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await
            .unwrap();

        match result.media {
            MediaResult::Featured(view) => {
                assert_eq!(view.id, 3);
                // The URL is minted fresh, never read from the cache.
                assert!(view.public_url.is_some());
            }
            _ => panic!("expected a featured result"),
        }

        let log = service.db.into_transaction_log();
        assert_eq!(log.len(), 1, "cache hit must not query the files table");
    }

    #[tokio::test]
    async fn featured_request_clears_stale_pointer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![make_project(Some(77))]])
            .append_query_results([Vec::<file::Model>::new()]) // pointer target gone
            .append_exec_results(vec![exec_ok(); 1])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .get_media(
                GetMediaRequest {
                    project_id: Some(42),
                    media_type: Some("featuredImage".to_string()),
                    ..Default::default()
                },
                &staff_user(),
            )
            .await
            .unwrap();

        assert!(matches!(result.media, MediaResult::None));
        let log = logged_sql(service.db);
        assert!(log.contains("UPDATE \"projects\""));
    }

    #[tokio::test]
    async fn update_featured_image_sets_pointer_and_invalidates_cache() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![exec_ok(); 1])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service
            .update_featured_image(42, Some(5), true)
            .await
            .unwrap();
        assert!(result.success);

        let log = logged_sql(service.db);
        assert!(log.contains("UPDATE \"projects\""));
        assert!(log.contains("featured_image_data"));
    }

    #[tokio::test]
    async fn update_featured_image_unknown_project_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service.update_featured_image(404, Some(5), true).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_featured_image_requires_file_id_when_activating() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = MediaService::new(db, Arc::new(MemoryBlobStore::new()));

        let result = service.update_featured_image(42, None, true).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
