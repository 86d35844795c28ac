mod config;
mod entities;
mod error;
mod middleware;
mod models;
mod pagination;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::services::notify::EmailService;
use crate::services::s3::{BlobStore, S3Service};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::get_config();

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let store: Arc<dyn BlobStore> = Arc::new(S3Service::new().await);
    let email = EmailService::from_config(config);

    let app = routes::create_routes(AppState { db, store, email });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("Failed to bind listener");
    info!(
        "Listening on {}",
        listener.local_addr().expect("listener has no local address")
    );
    axum::serve(listener, app).await.expect("Server error");
}
