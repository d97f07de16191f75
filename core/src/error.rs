// src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Errors raised by the engine itself, as opposed to the ones returned by
/// user handlers. Handler error types must be constructible from this so the
/// engine can report setup problems through the caller's own error channel.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("step not found: {step}")]
  StepNotFound { step: String },

  #[error("step '{step}' is declared more than once")]
  DuplicateStep { step: String },

  #[error("required step '{step}' has no handlers")]
  HandlerMissing { step: String },

  #[error("no flow registered for context type {context_type}")]
  NotRegistered { context_type: String },

  #[error("context type mismatch (expected {expected})")]
  TypeMismatch { expected: String },

  #[error("handler failed: {source}")]
  Handler {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for FlowError {
  fn from(source: AnyhowError) -> Self {
    FlowError::Handler { source }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
