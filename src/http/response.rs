use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_FAIL_UNKNOWN: i32 = 1000;

/// Uniform JSON envelope. Failures are reported through `code` and `message`;
/// the HTTP status is always 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "success".into(),
            data: Some(data),
        }
    }

    pub fn fail(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail_with_error(err: impl std::fmt::Display) -> Self {
        Self::fail(CODE_FAIL_UNKNOWN, err.to_string())
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render<T: Serialize>(resp: ApiResponse<T>) -> (StatusCode, serde_json::Value) {
        let resp = resp.into_response();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_success_without_data() {
        let (status, json) = render(ApiResponse::success(())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], CODE_SUCCESS);
        assert_eq!(json["message"], "success");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_success_with_data() {
        let (status, json) = render(ApiResponse::success("hi")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], CODE_SUCCESS);
        assert_eq!(json["data"], "hi");
    }

    #[tokio::test]
    async fn test_fail() {
        let (status, json) = render(ApiResponse::<()>::fail(500, "unknown error")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], 500);
        assert_eq!(json["message"], "unknown error");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_fail_with_error() {
        let err = crate::error::AppError::Internal("boom".into());
        let (status, json) = render(ApiResponse::<()>::fail_with_error(&err)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], CODE_FAIL_UNKNOWN);
        assert_eq!(json["message"], "boom");
    }
}
