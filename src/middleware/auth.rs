use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::utils::api_response::ApiResponse;

/// Role cache keyed by user id. Keeps the per-request role lookup off the
/// database for the common case.
pub type RoleCache = Arc<Cache<i32, UserPermissions>>;

pub fn create_role_cache() -> RoleCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

/// JWT middleware: validates the bearer token and attaches `Claims` to the
/// request extensions.
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        error!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Role of the authenticated user as stored in the database. The loyalty
/// program only distinguishes guests from administrators.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPermissions {
    pub user_id: i32,
    pub role: String,
}

impl UserPermissions {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn is_guest(&self) -> bool {
        self.role == "guest"
    }
}

/// Role middleware: resolves the caller's database role (cached) and
/// attaches `UserPermissions` to the request extensions.
pub async fn role_middleware(
    State(db_pool): State<PgPool>,
    Extension(role_cache): Extension<RoleCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: i32 = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    if let Some(cached) = role_cache.get(&user_id) {
        req.extensions_mut().insert(cached);
        return Ok(next.run(req).await);
    }

    let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&db_pool)
        .await
        .map_err(|err| {
            error!("Database query failed: {:?}", err);
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user role",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response()
        })?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Unknown user", None).into_response()
        })?;

    let permissions = UserPermissions { user_id, role };
    role_cache.insert(user_id, permissions.clone());

    req.extensions_mut().insert(permissions);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_is_recognized() {
        let perms = UserPermissions {
            user_id: 1,
            role: "admin".to_string(),
        };
        assert!(perms.is_admin());
        assert!(!perms.is_guest());
    }

    #[test]
    fn guest_role_is_not_admin() {
        let perms = UserPermissions {
            user_id: 2,
            role: "guest".to_string(),
        };
        assert!(!perms.is_admin());
        assert!(perms.is_guest());
    }
}
