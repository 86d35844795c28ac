use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entities::project::{self, Entity as Project};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::pagination::{PaginatedResponse, Pagination};
use crate::services::media::{FeaturedUpdateResult, MediaService};
use crate::state::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateProjectRequest {
    name: String,
    description: Option<String>,
    /// Lifecycle status code; defaults to the intake stage.
    status: Option<i32>,
    /// Client profile that owns the project; defaults to the caller.
    owner_id: Option<i32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProjectRequest {
    name: Option<String>,
    description: Option<String>,
    status: Option<i32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct FeaturedImageRequest {
    file_id: Option<i32>,
    is_active: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProjectResponse {
    id: i32,
    owner_id: i32,
    name: String,
    description: Option<String>,
    status: i32,
    featured_image_id: Option<i32>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

impl From<project::Model> for ProjectResponse {
    fn from(project: project::Model) -> Self {
        ProjectResponse {
            id: project.id,
            owner_id: project.owner_id,
            name: project.name,
            description: project.description,
            status: project.status,
            featured_image_id: project.featured_image_id,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created successfully", body = ProjectResponse),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project Management"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let project = project::ActiveModel {
        owner_id: Set(payload.owner_id.unwrap_or(auth_user.id)),
        name: Set(payload.name),
        description: Set(payload.description),
        status: Set(payload.status.unwrap_or(10)),
        created_at: Set(chrono::Utc::now().naive_utc()),
        updated_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };

    let created = project.insert(&state.db).await?;

    info!("Projects | created '{}' ({})", created.name, created.id);
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/projects",
    params(
        Pagination
    ),
    responses(
        (status = 200, description = "List of projects visible to the caller", body = PaginatedResponse<ProjectResponse>),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project Management"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<ProjectResponse>>, AppError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit();

    let mut query = Project::find();
    // Clients only see their own projects; staff and admins see everything.
    if !auth_user.role.can_view_private() {
        query = query.filter(project::Column::OwnerId.eq(auth_user.id));
    }

    let paginator = query
        .order_by_desc(project::Column::CreatedAt)
        .paginate(&state.db, limit);

    let total_items = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    let data: Vec<ProjectResponse> = items.into_iter().map(ProjectResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_items, page, limit)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project details", body = ProjectResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project Management"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = Project::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    if !auth_user.role.can_view_private() && project.owner_id != auth_user.id {
        return Err(AppError::Forbidden(
            "Access denied to this project".to_string(),
        ));
    }

    Ok(Json(ProjectResponse::from(project)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated successfully", body = ProjectResponse),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project Management"
)]
pub async fn update_project(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project = Project::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    let mut active: project::ActiveModel = project.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    let updated = active.update(&state.db).await?;

    info!("Projects | updated {} (status={})", updated.id, updated.status);
    Ok(Json(ProjectResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project deleted successfully"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project Management"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = Project::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Project not found".to_string()));
    }

    info!("Projects | deleted {}", id);
    Ok(Json(serde_json::json!({
        "message": "Project deleted successfully",
        "id": id
    })))
}

#[utoipa::path(
    put,
    path = "/projects/{id}/featured-image",
    params(
        ("id" = i32, Path, description = "Project ID")
    ),
    request_body = FeaturedImageRequest,
    responses(
        (status = 200, description = "Featured image pointer updated", body = FeaturedUpdateResult),
        (status = 400, description = "Missing file id"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Media"
)]
pub async fn update_featured_image(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<FeaturedImageRequest>,
) -> Result<Json<FeaturedUpdateResult>, AppError> {
    let service = MediaService::new(state.db.clone(), state.store.clone());
    let result = service
        .update_featured_image(id, payload.file_id, payload.is_active)
        .await?;
    Ok(Json(result))
}
