//! Error bodies for the HTTP API.
//!
//! Same codes as the live channel: `{"error": {"code": .., "message": ..}}`.

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;

use crate::error::EngineError;
use crate::server::identity::IdentityError;

pub fn http_error_response(code: &str, message: &str, status: StatusCode) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "error": { "code": code, "message": message }
    }))
}

pub fn status_of(err: &EngineError) -> StatusCode {
    match err {
        EngineError::AlreadyQueued | EngineError::AlreadyInMatch | EngineError::MatchAlreadyClosed => {
            StatusCode::CONFLICT
        }
        EngineError::NotInMatch => StatusCode::NOT_FOUND,
        EngineError::InvalidMove(_) => StatusCode::BAD_REQUEST,
        EngineError::DeliveryFailed | EngineError::PersistenceFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn engine_error(err: &EngineError) -> HttpResponse {
    http_error_response(err.code(), &err.to_string(), status_of(err))
}

pub fn identity_error(err: &IdentityError) -> HttpResponse {
    http_error_response(err.code(), &err.to_string(), StatusCode::BAD_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(&EngineError::AlreadyQueued), StatusCode::CONFLICT);
        assert_eq!(status_of(&EngineError::NotInMatch), StatusCode::NOT_FOUND);
        assert_eq!(engine_error(&EngineError::MatchAlreadyClosed).status(), StatusCode::CONFLICT);
        assert_eq!(identity_error(&IdentityError::Missing).status(), StatusCode::BAD_REQUEST);
    }
}
