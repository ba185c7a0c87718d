// src/error.rs
use thiserror::Error;

/// Reasons a class name cannot be registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Class name cannot be empty")]
    EmptyClassName,

    #[error("Invalid class name '{0}': must start with a letter or underscore and contain only letters, numbers, or underscores")]
    InvalidClassName(String),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Subclass registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl ParseError {
    /// Returns `true` if this error was produced by a rejected registration.
    pub fn is_registration_error(&self) -> bool {
        matches!(self, ParseError::Registration(_))
    }
}
