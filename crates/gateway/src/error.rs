//! Error responses sent before the first byte of a stream.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use streamgate_core::{Error, UpstreamError};

/// A non-streaming `{"error": {"message", "type"}}` response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: &'static str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    message: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: "invalid_request_error",
        }
    }

    pub fn timeout() -> Self {
        UpstreamError::Timeout("request deadline exceeded".into()).into()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        Self {
            status: StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Upstream(e) => e.into(),
            Error::InvalidRequest(message) => Self::invalid_request(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                message: &self.message,
                kind: self.kind,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_map_to_status_and_type() {
        let err: ApiError = UpstreamError::Unauthorized("no token".into()).into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.kind, "authentication_error");

        let err: ApiError = UpstreamError::Rejected {
            status: 422,
            body: "bad".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind, "upstream_error");

        let err: ApiError = UpstreamError::Transport("reset".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(ApiError::timeout().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn domain_errors_map() {
        let err: ApiError = Error::InvalidRequest("messages must not be empty".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "messages must not be empty");
    }

    #[test]
    fn invalid_upstream_status_falls_back_to_bad_gateway() {
        let err: ApiError = UpstreamError::Rejected {
            status: 42,
            body: String::new(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
