use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::InferenceError;
use crate::storage::upload_store::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing multipart field '{0}'")]
    MissingField(&'static str),
    #[error("Multipart error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("Upload error: {0}")]
    Storage(#[from] StorageError),
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::EmptyFilename | StorageError::InvalidFormat(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Storage(StorageError::FileTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
