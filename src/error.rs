//! Error types for a3s-taint

use thiserror::Error;

/// Errors that can occur while labeling and propagating taint
#[derive(Debug, Error)]
pub enum TaintError {
    /// Candidate merit has no propagation marker, or a non-canonical one
    #[error("Invalid merit object passed: {0}")]
    InvalidMerit(String),

    /// A merit's propagation marker was not recognized during combination
    #[error("Invalid taint propagation strategy for merit '{0}'")]
    InvalidPropagationStrategy(String),

    /// Attempted to stamp a label set onto a value that cannot carry one
    #[error("Attempting tainting of non-taintable object of type {0}")]
    NotTaintable(String),

    /// Duplicating an aliased value or allocating a sequence failed
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// A string operation received an argument it cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A sink received a value lacking a required merit
    #[error("Object \"{value}\" has no merit {merit}")]
    MissingMerit {
        value: String,
        merit: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Merit registry failure (poisoned lock)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for taint operations
pub type Result<T> = std::result::Result<T, TaintError>;
