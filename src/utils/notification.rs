use serde_json::{json, Value};
use sqlx::PgPool;

use crate::db::models::loyalty::{RedemptionRequest, RedemptionStatus};

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to serialize notification data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Builder for guest-facing notifications.
pub struct NotificationBuilder {
    user_id: i32,
    title: String,
    body: Option<String>,
    action_type: Option<String>,
    action_data: Option<Value>,
}

impl NotificationBuilder {
    pub fn new(user_id: i32, title: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            body: None,
            action_type: None,
            action_data: None,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the action type and data for when the notification is clicked.
    pub fn action(mut self, action_type: impl Into<String>, action_data: Value) -> Self {
        self.action_type = Some(action_type.into());
        self.action_data = Some(action_data);
        self
    }

    pub async fn send(self, pool: &PgPool) -> NotificationResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO notifications (user_id, title, body, action_type, action_data) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(self.user_id)
        .bind(&self.title)
        .bind(&self.body)
        .bind(&self.action_type)
        .bind(&self.action_data)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }
}

/// Tell the guest their redemption request was approved or rejected.
pub async fn notify_redemption_decided(
    pool: &PgPool,
    request: &RedemptionRequest,
) -> NotificationResult<i32> {
    let (title, verb) = match request.status {
        RedemptionStatus::Approved => ("Redemption request approved", "approved"),
        RedemptionStatus::Rejected => ("Redemption request rejected", "rejected"),
        RedemptionStatus::Pending => ("Redemption request received", "received"),
    };

    let mut body = format!(
        "Your request to redeem {} jewels was {}.",
        request.jewels_to_redeem, verb
    );
    if let Some(notes) = request.admin_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str(&format!(" Notes from our team: {notes}"));
    }

    NotificationBuilder::new(request.guest_id, title)
        .body(body)
        .action(
            "view_redemption_request",
            json!({ "request_id": request.id }),
        )
        .send(pool)
        .await
}
