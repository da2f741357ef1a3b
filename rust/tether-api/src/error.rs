//! Errors surfaced by an [crate::Api]

use tether_schema::SchemaError;
use thiserror::Error;

/// Errors returned to callers of an API, each mapping onto a transport status
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The input or the extend query was malformed or too large
    #[error("{0}")]
    BadRequest(String),

    /// The caller could not be identified
    #[error("{0}")]
    Unauthenticated(String),

    /// The caller is not allowed to perform the call
    #[error("{0}")]
    Forbidden(String),

    /// The method (or a record it depends on) does not exist
    #[error("{0}")]
    NotFound(String),

    /// The call conflicts with the current state
    #[error("{0}")]
    Conflict(String),

    /// Anything that went wrong on the server side
    #[error("{0}")]
    Server(String),

    /// A method or type was registered under a name that is already taken
    #[error("\"{name}\" is already defined")]
    AlreadyDefined {
        /// The contested name
        name: String,
    },

    /// A method was registered with descriptors that can not serve it
    #[error("Invalid definition of \"{name}\": {reason}")]
    InvalidDefinition {
        /// The method name
        name: String,
        /// What is wrong with it
        reason: String,
    },
}

impl ApiError {
    /// The HTTP style status code of the error
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthenticated(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Server(_)
            | ApiError::AlreadyDefined { .. }
            | ApiError::InvalidDefinition { .. } => 500,
        }
    }

    /// A short human readable name of the status
    pub fn name(&self) -> &'static str {
        match self.status_code() {
            400 => "Bad Request",
            401 => "Unauthenticated",
            403 => "Forbidden",
            404 => "Not Found",
            409 => "Conflict",
            _ => "Server error",
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(error: SchemaError) -> Self {
        match error {
            SchemaError::Validation { .. } | SchemaError::SelectionLimit { .. } => {
                ApiError::BadRequest(error.to_string())
            }
            SchemaError::NotFound { .. } => ApiError::NotFound(error.to_string()),
            error => ApiError::Server(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Server(format!("Serialization error: {error}"))
    }
}
