// region:    --- Imports
use crate::store::StoreError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Rejection
/// 비즈니스 규칙 위반 코드 (응답의 "code" 필드)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCode {
    NotStarted,
    AlreadyEnded,
    InvalidStatus,
    LowBid,
    BelowSilentFloor,
    InvalidTransition,
    NoBids,
    AutoBidTooLow,
    BidTooHigh,
    OwnAuction,
}

/// 규칙 위반으로 거절된 요청
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    pub code: RejectCode,
    pub message: String,
}

impl Rejection {
    pub fn new(code: RejectCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
// endregion: --- Rejection

// region:    --- App Error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("تعذر تنفيذ الطلب بسبب ضغط المزايدات، يرجى المحاولة مرة أخرى")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn item_not_found(item_id: i64) -> Self {
        AppError::NotFound(format!("المزاد رقم {} غير موجود", item_id))
    }

    fn status_and_code(&self) -> (StatusCode, String) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string()),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST".to_string()),
            AppError::Rejected(rejection) => (
                StatusCode::BAD_REQUEST,
                serde_json::to_value(rejection.code)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "REJECTED".to_string()),
            ),
            AppError::Conflict => (StatusCode::CONFLICT, "MAX_RETRIES_EXCEEDED".to_string()),
            AppError::Store(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL".to_string())
            }
        }
    }
}

/// 잘못된 JSON 본문
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(format!("طلب غير صالح: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 내부 오류는 상세 내용을 로그로만 남긴다
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{:<12} --> 내부 오류: {}", "Error", self);
            "حدث خطأ في الخادم".to_string()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
// endregion: --- App Error
