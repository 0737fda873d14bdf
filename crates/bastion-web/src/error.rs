use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bastion_core::errors::Error;
use serde_json::json;

const UNEXPECTED: &str = "Something unexpected went wrong";

/// Core error rendered as a JSON `{message}` response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

pub fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::Unauthorized(_) | Error::NotConnected(_) => StatusCode::UNAUTHORIZED,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) | Error::MissingUser(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            UNEXPECTED.to_string()
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
            self.0.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
