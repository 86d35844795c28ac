use axum::{extract::State, response::Json, Extension};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::profile::{self, Entity as Profile};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct EmailNotificationRequest {
    recipient_ids: Vec<i32>,
    subject: String,
    message: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NotificationOutcome {
    profile_id: i32,
    email: Option<String>,
    success: bool,
    error: Option<String>,
}

/// Delivery is reported per recipient; one bad address does not fail the
/// whole batch.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EmailNotificationResponse {
    success: bool,
    sent: usize,
    failed: usize,
    results: Vec<NotificationOutcome>,
}

#[utoipa::path(
    post,
    path = "/notifications/email",
    request_body = EmailNotificationRequest,
    responses(
        (status = 200, description = "Fan-out attempted; see per-recipient results", body = EmailNotificationResponse),
        (status = 400, description = "No recipients given"),
        (status = 500, description = "Email delivery not configured")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notifications"
)]
pub async fn send_email(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<EmailNotificationRequest>,
) -> Result<Json<EmailNotificationResponse>, AppError> {
    let mailer = state.email.as_ref().ok_or_else(|| {
        AppError::InternalServerError("Email delivery is not configured".to_string())
    })?;

    if payload.recipient_ids.is_empty() {
        return Err(AppError::BadRequest("No recipients given".to_string()));
    }

    let recipients = Profile::find()
        .filter(profile::Column::Id.is_in(payload.recipient_ids.clone()))
        .all(&state.db)
        .await?;

    let mut results = Vec::with_capacity(payload.recipient_ids.len());

    for id in &payload.recipient_ids {
        let Some(recipient) = recipients.iter().find(|p| p.id == *id) else {
            results.push(NotificationOutcome {
                profile_id: *id,
                email: None,
                success: false,
                error: Some("Profile not found".to_string()),
            });
            continue;
        };

        let Some(address) = recipient.email.clone() else {
            results.push(NotificationOutcome {
                profile_id: *id,
                email: None,
                success: false,
                error: Some("No email address on file".to_string()),
            });
            continue;
        };

        match mailer.send(&address, &payload.subject, &payload.message).await {
            Ok(()) => results.push(NotificationOutcome {
                profile_id: *id,
                email: Some(address),
                success: true,
                error: None,
            }),
            Err(e) => {
                warn!("Notifications | delivery to {} failed: {}", address, e);
                results.push(NotificationOutcome {
                    profile_id: *id,
                    email: Some(address),
                    success: false,
                    error: Some(e),
                });
            }
        }
    }

    let sent = results.iter().filter(|r| r.success).count();
    let failed = results.len() - sent;

    info!(
        "Notifications | email fan-out | by={} sent={} failed={}",
        auth_user.username, sent, failed
    );
    Ok(Json(EmailNotificationResponse {
        success: failed == 0,
        sent,
        failed,
        results,
    }))
}
