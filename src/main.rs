use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::ledger::LedgerDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::redemption::RedemptionDoc;
use crate::middleware::auth::{create_role_cache, jwt_middleware, role_middleware};

#[tokio::main]
async fn main() {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");
    let file_appender = tracing_appender::rolling::daily("logs", "loyalty-backend.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking)
        .init();

    let role_cache = create_role_cache();
    let pool = db::pool::get_db_pool().await;

    let merged_doc = AuthDoc::openapi()
        .merge_from(RedemptionDoc::openapi())
        .merge_from(LedgerDoc::openapi())
        .merge_from(NotificationDoc::openapi());

    // Public routes (no JWT required)
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::loyalty::loyalty_routes())
        .merge(api::notification::notification_routes())
        .merge(api::auth::secure_auth_routes())
        .route_layer(from_fn_with_state(pool.clone(), role_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(Extension(role_cache.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    run_server(app, shutdown_tx, pool).await;
    info!("Shutdown complete.");
}

async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>, pool: PgPool) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => info!("Received shutdown signal."),
    }
    info!("Closing database pool...");
    pool.close().await;
    info!("Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, shutdown_tx: broadcast::Sender<()>, pool: PgPool) {
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    let shutdown = shutdown_signal(shutdown_tx.subscribe(), pool.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server encountered an error");
}
