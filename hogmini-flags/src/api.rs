use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::flag_matching::InvalidInputError;
use crate::redis::CustomRedisError;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagsResponse {
    pub error_while_computing_flags: bool,
    pub feature_flags: HashMap<String, bool>,
}

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("failed to decode request: {0}")]
    RequestDecodingError(String),
    #[error("failed to parse request: {0}")]
    RequestParsingError(#[from] serde_json::Error),

    #[error("Empty distinct_id in request")]
    EmptyDistinctId,
    #[error("No distinct_id in request")]
    MissingDistinctId,

    #[error("Missing API Key")]
    NoTokenError,
    #[error("Invalid API Key")]
    TokenValidationError,

    #[error("invalid flag input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("Organization name is required")]
    MissingOrganizationName,
    #[error("could not derive a slug from {0:?}")]
    InvalidSlug(String),
    #[error("Organization not found")]
    OrganizationNotFound,
    #[error("could not find a free slug for {base} after {attempts} attempts")]
    SlugUnavailable { base: String, attempts: usize },

    #[error("Project name is required")]
    MissingProjectName,
    #[error("Project not found")]
    ProjectNotFound,

    #[error("Missing key or projectId")]
    MissingFlagFields,
    #[error("Flag already exists in this project")]
    FlagAlreadyExists,
    #[error("Flag not found")]
    FlagNotFound,

    #[error("failed to parse redis cache data")]
    DataParsingError,
    #[error("redis unavailable")]
    RedisUnavailable,
    #[error("Timed out while fetching data")]
    TimeoutError,
}

impl FlagError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FlagError::RequestDecodingError(_)
            | FlagError::RequestParsingError(_)
            | FlagError::EmptyDistinctId
            | FlagError::MissingDistinctId
            | FlagError::InvalidInput(_)
            | FlagError::MissingOrganizationName
            | FlagError::InvalidSlug(_)
            | FlagError::MissingProjectName
            | FlagError::MissingFlagFields => StatusCode::BAD_REQUEST,

            FlagError::NoTokenError | FlagError::TokenValidationError => StatusCode::UNAUTHORIZED,

            FlagError::OrganizationNotFound
            | FlagError::ProjectNotFound
            | FlagError::FlagNotFound => StatusCode::NOT_FOUND,

            FlagError::SlugUnavailable { .. } | FlagError::FlagAlreadyExists => {
                StatusCode::CONFLICT
            }

            FlagError::DataParsingError
            | FlagError::RedisUnavailable
            | FlagError::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for FlagError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<CustomRedisError> for FlagError {
    fn from(e: CustomRedisError) -> Self {
        match e {
            CustomRedisError::NotFound => FlagError::TokenValidationError,
            CustomRedisError::Timeout => FlagError::TimeoutError,
            CustomRedisError::Other(e) => {
                tracing::error!("Unknown redis error: {}", e);
                FlagError::RedisUnavailable
            }
        }
    }
}
