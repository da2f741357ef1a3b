//! Error types for validation and resolution

use std::fmt::Display;

use thiserror::Error;

/// The budget of a [crate::GuardConfig] that a selection tree exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionLimit {
    /// The selection is nested deeper than `max_depth`
    Depth,
    /// One level of the selection has more than `max_nodes_per_level` keys
    Weight,
    /// The selection has more than `max_total_nodes` keys overall
    Nodes,
}

impl Display for SelectionLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionLimit::Depth => write!(f, "depth"),
            SelectionLimit::Weight => write!(f, "weight"),
            SelectionLimit::Nodes => write!(f, "nodes"),
        }
    }
}

/// One of the two independent capabilities a [crate::Descriptor] may have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Validating raw input
    Input,
    /// Resolving output trees
    Output,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Input => write!(f, "input"),
            Capability::Output => write!(f, "output"),
        }
    }
}

/// Errors that can occur while validating input, checking a selection tree
/// or resolving output
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Raw input or a selection tree did not have the expected shape
    #[error("{message} [{path}]")]
    Validation {
        /// Where the problem was found, e.g. `input.items[2]`
        path: String,
        /// What is wrong
        message: String,
    },

    /// A value produced by the server did not match its output descriptor
    #[error("{message} [{path}]")]
    Resolution {
        /// Where the problem was found, e.g. `output.author`
        path: String,
        /// What is wrong
        message: String,
    },

    /// A non-nullable relation pointed at a record that does not exist
    #[error("{message} [{path}]")]
    NotFound {
        /// Position of the relation
        path: String,
        /// What is missing
        message: String,
    },

    /// An entity was used before its resolver was attached
    #[error("Entity \"{entity}\" is not initialized")]
    Uninitialized {
        /// Entity name
        entity: String,
    },

    /// An entity resolver was attached twice
    #[error("Entity \"{entity}\" already has a resolver")]
    AlreadyAttached {
        /// Entity name
        entity: String,
    },

    /// A selection tree exceeded one of the guard budgets
    #[error("Max {limit} of extend query exceeded")]
    SelectionLimit {
        /// The budget that ran out
        limit: SelectionLimit,
    },

    /// A descriptor was asked to do something it has no capability for
    #[error("Descriptor has no {capability} capability")]
    MissingCapability {
        /// The capability that was needed
        capability: Capability,
    },

    /// The batch function behind a loader failed
    #[error("Batch fetch failed: {0}")]
    BatchFetch(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// The serializer's message
        message: String,
    },
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

impl SchemaError {
    /// Malformed input or selection at `path`
    pub fn validation(path: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Output at `path` that does not match its descriptor
    pub fn resolution(path: &str, message: impl Into<String>) -> Self {
        Self::Resolution {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Missing record at `path`
    pub fn not_found(path: &str, message: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Wrap the failure of a batch function
    pub fn batch_fetch(error: impl Display) -> Self {
        Self::BatchFetch(error.to_string())
    }

    /// Whether the error was caused by the caller (bad input or an illegal
    /// selection) rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SchemaError::Validation { .. } | SchemaError::SelectionLimit { .. }
        )
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
