//! HTTP error bodies.
//!
//! Every failure leaves the API as `{ "message": ..., "code": ... }`; the
//! status is derived from the code.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use domains::{AuthError, ThreadError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
pub const INTERNAL: &str = "INTERNAL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing message
    pub message: String,
    /// Machine-readable code, the same vocabulary as `ThreadError::code`
    pub code: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, INTERNAL)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "UNAUTHORIZED" => StatusCode::FORBIDDEN,
            UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
            "TRANSIENT" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = %self.code, message = %self.message, "request failed");
        } else {
            debug!(code = %self.code, message = %self.message, "request rejected");
        }
        (status, Json(self)).into_response()
    }
}

impl From<ThreadError> for HttpError {
    fn from(err: ThreadError) -> Self {
        HttpError::new(err.to_string(), err.code())
    }
}

impl From<AuthError> for HttpError {
    fn from(err: AuthError) -> Self {
        HttpError::new(err.to_string(), UNAUTHENTICATED)
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::new(rejection.body_text(), "VALIDATION_ERROR")
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        HttpError::new(rejection.body_text(), "VALIDATION_ERROR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_errors_map_to_statuses() {
        let cases = [
            (ThreadError::Validation("empty body".into()), StatusCode::BAD_REQUEST),
            (ThreadError::not_found("node", "abc"), StatusCode::NOT_FOUND),
            (ThreadError::Unauthorized("not yours".into()), StatusCode::FORBIDDEN),
            (ThreadError::Transient("db down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status(), status);
        }
    }

    #[test]
    fn credential_failures_are_401() {
        assert_eq!(HttpError::from(AuthError::Missing).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            HttpError::from(AuthError::Invalid("expired".into())).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn body_is_message_and_code() {
        let body = serde_json::to_value(HttpError::from(ThreadError::not_found("node", "abc"))).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "node not found with ID abc");
    }
}
