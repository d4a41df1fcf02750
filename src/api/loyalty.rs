use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::ledger::get_account_summary;
use crate::db::queries::redemption::*;

pub fn loyalty_routes() -> Router<PgPool> {
    Router::new()
        .route("/loyalty/redemption-requests", post(create_redemption_request))
        .route("/loyalty/redemption-requests", get(list_redemption_requests))
        .route(
            "/loyalty/redemption-requests/{request_id}",
            get(get_redemption_request_handler),
        )
        .route(
            "/loyalty/redemption-requests/{request_id}",
            put(decide_redemption_request),
        )
        .route("/loyalty/accounts/{guest_id}/summary", get(get_account_summary))
}
