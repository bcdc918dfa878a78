//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the loading pipeline
//! and the HTTP frontend, along with the mapping from error variants to HTTP
//! status codes and boundary response bodies.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("data directory not found or not a directory: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("unsupported file type: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("dataset not found: {}", .requested.join(", "))]
    DatasetNotFound {
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("{0}")]
    InvalidPagination(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn parse(path: &std::path::Path, message: impl Into<String>) -> Self {
        AppError::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::DatasetNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidPagination(_) => StatusCode::BAD_REQUEST,
            AppError::DirectoryNotFound { .. }
            | AppError::UnsupportedFormat { .. }
            | AppError::Parse { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Boundary shape is always `{error, details}`. Client errors carry structured
/// detail; everything else is reported as a generic 500 with no internal
/// detail leaked.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = match &self {
            AppError::DatasetNotFound {
                requested,
                available,
            } => json!({
                "error": "Dataset not found",
                "details": {
                    "requested": requested,
                    "available": available,
                }
            }),
            AppError::InvalidPagination(message) => json!({
                "error": message,
                "details": null,
            }),
            _ => {
                tracing::error!("request failed: {self}");
                json!({
                    "error": "Internal server error",
                    "details": null,
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
