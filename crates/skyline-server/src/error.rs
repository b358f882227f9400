use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use skyline_index::IndexError;
use skyline_protocol::XrpcError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// An XRPC error response: status code plus `{error, message}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: XrpcError,
}

impl ApiError {
    pub fn bad_request(error: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: XrpcError::new(error, message),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: XrpcError::new("InternalServerError", message),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::InvalidCursor(cursor) => {
                Self::bad_request("InvalidRequest", format!("malformed cursor {cursor:?}"))
            }
            other => {
                error!(error = %other, "post index unavailable");
                Self::internal("post index unavailable")
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("InvalidRequest", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
