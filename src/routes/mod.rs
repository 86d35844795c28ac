mod auth;
mod home;
mod media;
mod notifications;
mod projects;
mod users;

use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::auth::auth_middleware;
use crate::middleware::role::{require_admin, require_staff};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        // General endpoints
        home::root,
        // Authentication endpoints
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        // User management endpoints
        users::create_user,
        users::list_users,
        users::delete_user,
        // Project management endpoints
        projects::create_project,
        projects::list_projects,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        projects::update_featured_image,
        // Media endpoints
        media::save_media,
        media::upload_media,
        media::get_media,
        media::delete_media,
        // Notification endpoints
        notifications::send_email,
    ),
    components(
        schemas(
            // Home schemas
            home::RootResponse,
            // Auth schemas
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RefreshRequest,
            auth::RefreshResponse,
            auth::LogoutRequest,
            auth::LogoutResponse,
            auth::UserProfile,
            // User schemas
            users::CreateUserRequest,
            users::UserResponse,
            crate::entities::profile::Role,
            // Project schemas
            projects::CreateProjectRequest,
            projects::UpdateProjectRequest,
            projects::FeaturedImageRequest,
            projects::ProjectResponse,
            crate::pagination::PaginatedResponse<projects::ProjectResponse>,
            // Media schemas
            media::SaveMediaBody,
            crate::services::storage_path::TargetLocation,
            crate::services::media::SavedMedia,
            crate::services::media::MediaItem,
            crate::services::media::MediaQueryResult,
            crate::services::media::FeaturedMediaView,
            crate::services::media::DeleteMediaResult,
            crate::services::media::DeletedFileInfo,
            crate::services::media::FeaturedUpdateResult,
            crate::models::featured::FeaturedImageData,
            // Notification schemas
            notifications::EmailNotificationRequest,
            notifications::NotificationOutcome,
            notifications::EmailNotificationResponse,
        )
    ),
    tags(
        (name = "General", description = "General API information"),
        (name = "Authentication", description = "Login, token refresh, and logout"),
        (name = "User Management", description = "Profile management (admin access required)"),
        (name = "Project Management", description = "Fire-protection project CRUD"),
        (name = "Media", description = "Versioned project files, uploads, and featured images"),
        (name = "Notifications", description = "Email notification fan-out")
    ),
    info(
        title = "FireGuard API",
        version = "0.1.0",
        description = "Backend API for fire-protection project management: projects, profiles, versioned media storage, and notifications",
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

pub fn create_routes(state: AppState) -> Router {
    // Swagger UI (stateless)
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    // Any authenticated role
    let authed_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/media", get(media::get_media))
        .route("/projects", get(projects::list_projects))
        .route("/projects/{id}", get(projects::get_project))
        .layer(from_fn(auth_middleware));

    // Staff and admin only
    let staff_routes = Router::new()
        .route("/media", post(media::save_media))
        .route("/media/upload", post(media::upload_media))
        .route("/media/{id}", delete(media::delete_media))
        .route("/projects", post(projects::create_project))
        .route("/projects/{id}", put(projects::update_project))
        .route(
            "/projects/{id}/featured-image",
            put(projects::update_featured_image),
        )
        .route("/notifications/email", post(notifications::send_email))
        .layer(from_fn(require_staff))
        .layer(from_fn(auth_middleware));

    // Admin only
    let admin_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/users", get(users::list_users))
        .route("/users/{id}", delete(users::delete_user))
        .route("/projects/{id}", delete(projects::delete_project))
        .layer(from_fn(require_admin))
        .layer(from_fn(auth_middleware));

    // Public routes plus everything merged together
    let app_routes = Router::new()
        .route("/", get(home::root))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .merge(authed_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Router::new().merge(swagger_router).merge(app_routes)
}
