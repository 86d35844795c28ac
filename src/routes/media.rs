use axum::{
    extract::{Multipart, Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::services::media::{
    DeleteMediaResult, GetMediaRequest, MediaQueryResult, MediaService, SaveMediaRequest,
    SavedMedia,
};
use crate::services::storage_path::TargetLocation;
use crate::services::uploader::MediaData;
use crate::state::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SaveMediaBody {
    /// Base64 payload, either bare or as a `data:<mime>;base64,...` URI.
    media_data: String,
    file_name: String,
    file_type: Option<String>,
    project_id: Option<i32>,
    target_location: Option<TargetLocation>,
    target_id: Option<i32>,
    title: Option<String>,
    description: Option<String>,
    /// Externally managed numbering for system-generated documents; skips
    /// the supersede/archive step.
    custom_version_number: Option<i32>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct UploadQuery {
    project_id: Option<i32>,
    target_location: Option<TargetLocation>,
    target_id: Option<i32>,
    title: Option<String>,
    description: Option<String>,
}

#[utoipa::path(
    post,
    path = "/media",
    request_body = SaveMediaBody,
    responses(
        (status = 200, description = "File saved successfully", body = SavedMedia),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Media"
)]
pub async fn save_media(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<SaveMediaBody>,
) -> Result<Json<SavedMedia>, AppError> {
    let service = MediaService::new(state.db.clone(), state.store.clone());

    let request = SaveMediaRequest {
        media_data: MediaData::DataUri(payload.media_data),
        file_name: payload.file_name,
        file_type: payload
            .file_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        project_id: payload.project_id,
        target_location: payload.target_location.unwrap_or(TargetLocation::Project),
        target_id: payload.target_id,
        title: payload.title,
        description: payload.description,
        custom_version_number: payload.custom_version_number,
    };

    let saved = service.save_media(request, &auth_user).await?;
    Ok(Json(saved))
}

#[utoipa::path(
    post,
    path = "/media/upload",
    params(
        UploadQuery
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded successfully", body = SavedMedia),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Media"
)]
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<SavedMedia>, AppError> {
    let service = MediaService::new(state.db.clone(), state.store.clone());

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("Invalid multipart data".to_string()))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("unknown").to_string();
            let file_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(|_| {
                AppError::BadRequest("Failed to read file bytes".to_string())
            })?;

            let request = SaveMediaRequest {
                media_data: MediaData::Bytes(data.to_vec()),
                file_name,
                file_type,
                project_id: query.project_id,
                target_location: query.target_location.unwrap_or(TargetLocation::Project),
                target_id: query.target_id,
                title: query.title,
                description: query.description,
                custom_version_number: None,
            };

            let saved = service.save_media(request, &auth_user).await?;
            info!(
                "Media | POST /media/upload | file={} | by={}",
                saved.file_name, auth_user.username
            );
            return Ok(Json(saved));
        }
    }

    Err(AppError::BadRequest("No file field found".to_string()))
}

#[utoipa::path(
    get,
    path = "/media",
    params(
        GetMediaRequest
    ),
    responses(
        (status = 200, description = "Media query result", body = MediaQueryResult),
        (status = 400, description = "Bad request"),
        (status = 404, description = "File or project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Media"
)]
pub async fn get_media(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<GetMediaRequest>,
) -> Result<Json<MediaQueryResult>, AppError> {
    let service = MediaService::new(state.db.clone(), state.store.clone());
    let result = service.get_media(query, &auth_user).await?;
    Ok(Json(result))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(
        ("id" = i32, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted successfully", body = DeleteMediaResult),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Media"
)]
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteMediaResult>, AppError> {
    let service = MediaService::new(state.db.clone(), state.store.clone());
    let result = service.delete_media(id, &auth_user).await?;
    Ok(Json(result))
}
