//! Types for parallel source invocation.
//!
//! This module defines the per-unit outcome type and the error type an
//! aggregation can terminate with.

use thiserror::Error;

use crate::compile::CompileError;

/// The mapped value produced by one invocation unit.
///
/// `value` is `None` when the unit's mapper returned the empty marker; the
/// unit still completed, it just contributes nothing to its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome<T> {
  /// The manifest key this outcome belongs to.
  pub key: String,
  /// The mapped value, or `None` when the unit produced no value.
  pub value: Option<T>,
}

/// Errors that can terminate an aggregation.
///
/// A fault recovered by a spec's `on_error` mapper never surfaces here;
/// everything below short-circuits the whole aggregation, and the caller
/// receives no partial result alongside it.
#[derive(Debug, Error)]
pub enum AggregateError<E> {
  /// A source reported a fault and its spec had no `on_error` recovery.
  #[error("source `{key}` failed: {fault}")]
  Fault { key: String, fault: E },

  /// A mapping callback or the invoke future itself panicked.
  #[error("source `{key}` panicked: {message}")]
  Panicked { key: String, message: String },

  /// The manifest failed to compile.
  #[error(transparent)]
  Compile(#[from] CompileError),
}

impl<E> AggregateError<E> {
  /// The manifest key the error is attributed to, when there is one.
  pub fn key(&self) -> Option<&str> {
    match self {
      AggregateError::Fault { key, .. } | AggregateError::Panicked { key, .. } => Some(key),
      AggregateError::Compile(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fault_display_names_key_and_fault() {
    let err: AggregateError<String> = AggregateError::Fault {
      key: "bar".to_string(),
      fault: "boom".to_string(),
    };

    assert_eq!(err.to_string(), "source `bar` failed: boom");
    assert_eq!(err.key(), Some("bar"));
  }

  #[test]
  fn panicked_display_names_key_and_message() {
    let err: AggregateError<String> = AggregateError::Panicked {
      key: "foo".to_string(),
      message: "mapper exploded".to_string(),
    };

    assert_eq!(err.to_string(), "source `foo` panicked: mapper exploded");
    assert_eq!(err.key(), Some("foo"));
  }

  #[test]
  fn compile_error_is_transparent() {
    let err: AggregateError<String> = CompileError::DuplicateKey("dup".to_string()).into();

    assert_eq!(err.to_string(), "duplicate manifest key: dup");
    assert_eq!(err.key(), None);
  }
}
