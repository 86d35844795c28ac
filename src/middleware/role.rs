use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::warn;

use crate::entities::profile::Role;
use crate::middleware::auth::AuthUser;

pub async fn require_admin(req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if auth_user.role != Role::Admin {
        warn!("Access denied: user '{}' is not an admin", auth_user.username);
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

/// Staff-level access: admins and staff pass, clients are rejected.
pub async fn require_staff(req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth_user.role.can_view_private() {
        warn!("Access denied: user '{}' is not staff", auth_user.username);
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
