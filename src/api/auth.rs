use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::db::models::user::{User, UserInfo};
use crate::{config::Config, utils::api_response::ApiResponse};

/// Represents a request to register a new guest account.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Desired username
    pub username: String,
    /// Contact email, also used on redemption requests
    pub email: String,
    /// User password
    pub password: String,
}

/// Represents a successful user registration response
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// The username of the authenticated user.
    pub username: String,
    /// The role assigned to the user (guest or admin)
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, ApiResponse<()>> {
        self.sub.parse::<i32>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

/// Represents a request to log in
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

/// Represents a successful login response returning a JWT token.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
}

/// Handles user login
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(
        content = LoginRequest,
        description = "User login details",
    ),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let config = Config::get();

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, email, role, created_at FROM users WHERE username = $1",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"success": false, "message": format!("Database error: {}", e)}).to_string(),
        )
    })?;

    if let Some(user) = user {
        match verify(&payload.password, &user.password_hash) {
            Ok(true) => {
                let claims = Claims {
                    sub: user.id.to_string(),
                    username: user.username.clone(),
                    role: user.role.clone(),
                    exp: chrono::Utc::now().timestamp() as usize + 36000, // 10 hour expiration
                };
                let token = encode(
                    &Header::default(),
                    &claims,
                    &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
                )
                .map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"success": false, "message": format!("Token generation failed: {}", e)})
                            .to_string(),
                    )
                })?;

                info!("Login successful for user: {}", payload.username);
                return Ok(Json(LoginResponse {
                    token,
                    role: user.role,
                }));
            }
            Ok(false) => {
                warn!("Invalid password attempt for user: {}", payload.username);
                return Err((
                    StatusCode::UNAUTHORIZED,
                    json!({"success": false, "message": "Invalid username or password."}).to_string(),
                ));
            }
            Err(e) => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"success": false, "message": format!("Password verification error: {}", e)})
                        .to_string(),
                ));
            }
        }
    }

    warn!("Login attempt for non-existent user: {}", payload.username);
    Err((
        StatusCode::UNAUTHORIZED,
        json!({"success": false, "message": "Invalid username or password."}).to_string(),
    ))
}

/// Handles guest registration. New accounts always get the `guest` role;
/// admins are promoted out of band.
///
/// # Returns
/// * `201 Created` - If registration is successful.
/// * `409 Conflict` - If the username is already taken.
/// * `500 Internal Server Error` - If a database error occurs.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Successful Register", body = RegisterResponse),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, String)> {
    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"success": false, "message": format!("Password hashing failed: {}", e)}).to_string(),
        )
    })?;

    let result = sqlx::query(
        "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, 'guest')",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .execute(&pool)
    .await;

    match result {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(RegisterResponse {
                message: "User registered".into(),
            }),
        )),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err((
                        StatusCode::CONFLICT,
                        json!({"success": false, "message": "Username already taken"}).to_string(),
                    ));
                }
            }
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"success": false, "message": format!("Database error: {}", e)}).to_string(),
            ))
        }
    }
}

/// Represents a request to change a user's password.
#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Allows an authenticated user to change their own password after
/// verifying the current one.
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 401, description = "Old password incorrect"),
        (status = 404, description = "User does not exist"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let current_hash = sqlx::query_scalar::<_, String>(
        "SELECT password_hash FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    let is_valid = verify(&payload.old_password, &current_hash).unwrap_or(false);
    if !is_valid {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Incorrect old password",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update password",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Password updated successfully",
        (),
    ))
}

/// Returns the authenticated user's own account info.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user info", body = UserInfo),
        (status = 404, description = "User does not exist"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let info = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, email, role, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Current user",
        UserInfo {
            id: info.id,
            username: info.username,
            email: info.email,
            role: info.role,
        },
    ))
}

/// Public authentication routes (no JWT required).
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

/// Authentication routes that sit behind the JWT middleware.
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/me", axum::routing::get(me))
        .route("/auth/change_password", post(change_password))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(login, register, me, change_password),
    components(schemas(LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, ChangePasswordRequest, UserInfo)),
    tags(
        (name = "Authentication", description = "Account registration and login")
    )
)]
pub struct AuthDoc;
