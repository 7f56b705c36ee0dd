use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::db::models::User;
use crate::http::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(default = "default_user_id")]
    pub id: i64,
}

fn default_user_id() -> i64 {
    1
}

/// GET /api/v1/user/query?id={id}
pub async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> ApiResponse<User> {
    match state.users.get_user(params.id) {
        Ok(user) => ApiResponse::success(user),
        Err(e) => {
            tracing::warn!(id = params.id, error = %e, "User query failed");
            ApiResponse::fail_with_error(e)
        }
    }
}
