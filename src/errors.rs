use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::AlreadyExists => AppError::Conflict(e.to_string()),
            DomainError::InvalidInput(_) | DomainError::InvalidTransition(_) => {
                AppError::BadRequest(e.to_string())
            }
            DomainError::Transport(msg) => AppError::Unavailable(msg),
            DomainError::CorruptRecord(msg)
            | DomainError::Encode(msg)
            | DomainError::TransactionAborted(msg)
            | DomainError::StoreRejected(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::Conflict(_) => HttpResponse::Conflict().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::BadRequest(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::Unavailable(msg) => {
                log::error!("store unavailable: {}", msg);
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "Service unavailable"
                }))
            }
            AppError::Internal(msg) => {
                log::error!("internal error: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_returns_409() {
        let err = AppError::Conflict("exists".to_string());
        assert_eq!(err.error_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn bad_request_returns_400() {
        let err = AppError::BadRequest("nope".to_string());
        assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unavailable_returns_503() {
        let err = AppError::Unavailable("connection refused".to_string());
        assert_eq!(err.error_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_display() {
        assert_eq!(AppError::NotFound.to_string(), "Not found");
    }

    #[test]
    fn domain_not_found_maps_to_app_not_found() {
        let app_err: AppError = DomainError::NotFound.into();
        assert!(matches!(app_err, AppError::NotFound));
    }

    #[test]
    fn domain_already_exists_maps_to_conflict() {
        let app_err: AppError = DomainError::AlreadyExists.into();
        assert!(matches!(app_err, AppError::Conflict(_)));
    }

    #[test]
    fn domain_invalid_transition_maps_to_bad_request() {
        let app_err: AppError = DomainError::InvalidTransition("shipped".to_string()).into();
        assert!(matches!(app_err, AppError::BadRequest(_)));
    }

    #[test]
    fn domain_transport_maps_to_unavailable() {
        let app_err: AppError = DomainError::Transport("timeout".to_string()).into();
        assert!(matches!(app_err, AppError::Unavailable(_)));
    }

    #[test]
    fn domain_store_rejected_maps_to_internal() {
        let app_err: AppError = DomainError::StoreRejected("WRONGTYPE".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }

    #[test]
    fn domain_transaction_aborted_maps_to_internal() {
        let app_err: AppError = DomainError::TransactionAborted("script".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }

    #[test]
    fn domain_corrupt_record_maps_to_internal() {
        let app_err: AppError = DomainError::CorruptRecord("order:1".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }
}
