// src/db/queries/notification.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use serde_json::json;
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::notification::Notification;
use crate::utils::api_response::ApiResponse;

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Undismissed notifications for the current user", body = Vec<Notification>),
        (status = 500, description = "Failed to retrieve notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_user_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<Notification>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT id, user_id, title, body, action_type, action_data, created_at, dismissed_at \
         FROM notifications \
         WHERE user_id = $1 AND dismissed_at IS NULL \
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve notifications",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications retrieved",
        notifications,
    ))
}

#[utoipa::path(
    post,
    path = "/notifications/{notification_id}/dismiss",
    params(
        ("notification_id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification dismissed"),
        (status = 404, description = "Notification not found"),
        (status = 500, description = "Failed to dismiss notification")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn dismiss_notification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let result = sqlx::query(
        "UPDATE notifications SET dismissed_at = NOW() \
         WHERE id = $1 AND user_id = $2 AND dismissed_at IS NULL",
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to dismiss notification",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Notification not found",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification dismissed",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_user_notifications, dismiss_notification),
    components(schemas(Notification)),
    tags(
        (name = "Notifications", description = "Guest notification inbox")
    )
)]
pub struct NotificationDoc;
