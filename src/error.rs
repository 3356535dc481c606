//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Startup-time failures: resource declarations that cannot be compiled into routes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("resource name must not be empty")]
    EmptyName,
    #[error("unknown action '{action}' in resource '{resource}'")]
    UnknownAction { resource: String, action: String },
    #[error("unknown relation action '{action}' in resource '{resource}'")]
    UnknownRelationAction { resource: String, action: String },
    #[error("%RELATION% must be nested below an identity segment in resource '{0}'")]
    MisplacedRelationExpansion(String),
    #[error("relation action '{action}' in resource '{resource}' is at the wrong depth")]
    MisplacedRelationAction { resource: String, action: String },
    #[error("duplicate route {verb} {path}")]
    DuplicateRoute { verb: String, path: String },
    #[error("duplicate relation name '{relation}' in resource '{resource}'")]
    DuplicateRelation { resource: String, relation: String },
    #[error("relation names must not be empty in resource '{0}'")]
    EmptyRelation(String),
    #[error("invalid action tree: {0}")]
    InvalidTree(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Failures reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected operation: {0}")]
    Rejected(String),
    #[error("unknown table '{0}'")]
    MissingTable(String),
    #[error("unknown relation '{relation}' on '{model}'")]
    MissingRelation { model: String, relation: String },
}

/// Field name -> messages. Serialized as a JSON object of string arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors(BTreeMap::new())
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for m in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, m)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("invalid: {0}")]
    Invalid(ValidationErrors),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Invalid(_) | AppError::Conflict(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::MethodNotAllowed(_) => "method_not_allowed",
            AppError::Invalid(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
            AppError::Store(_) => "store_error",
            AppError::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let details = match &self {
            AppError::Invalid(errors) => serde_json::to_value(errors).ok(),
            AppError::Conflict(message) => Some(serde_json::json!({ "conflict": [message] })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
