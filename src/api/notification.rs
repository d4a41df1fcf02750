// src/api/notification.rs
use crate::db::queries::notification::*;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

pub fn notification_routes() -> Router<PgPool> {
    Router::new()
        .route("/notifications", get(get_user_notifications))
        .route(
            "/notifications/{notification_id}/dismiss",
            post(dismiss_notification),
        )
}
