use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;
use crate::storage::MediaStoreError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Missing or malformed client input; the message is shown verbatim.
    #[error("{0}")]
    BadRequest(String),
    #[error("ad not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// Dependency failure; carries the raw underlying message, unsanitized.
    #[error("{0}")]
    Internal(String),
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<MediaStoreError> for ApiError {
    fn from(e: MediaStoreError) -> Self {
        match e {
            MediaStoreError::Other(msg) => ApiError::Internal(msg),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpResponse::build(status).json(ApiErrorBody { error: self.to_string() })
    }
}
