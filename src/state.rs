use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::services::notify::EmailService;
use crate::services::s3::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn BlobStore>,
    /// Absent when SMTP is not configured; the notification endpoint then
    /// reports delivery as unavailable instead of failing at startup.
    pub email: Option<EmailService>,
}
