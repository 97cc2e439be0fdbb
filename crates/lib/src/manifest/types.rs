//! Manifest types for manifold.
//!
//! The manifest is the central input data structure: a sequence of named
//! entries, each describing either a single asynchronous source or an
//! ordered list of sources sharing one key. It is consumed whole by one
//! aggregation call.
//!
//! # Shape
//!
//! Whether a key assembles to a scalar or a list is declared here, at the
//! manifest boundary, by picking [`Manifest::source`] or
//! [`Manifest::sources`]. Nothing downstream inspects values to infer shape.
//!
//! # Ordering
//!
//! Entries keep their insertion order. Within a list entry, element order is
//! the order values appear in the assembled result; across keys, insertion
//! order fixes a deterministic unit ordering for the whole aggregation.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

/// Mapper applied to a source's success value before it is stored.
pub type SuccessMapper<T> = Box<dyn FnOnce(T) -> Option<T> + Send>;

/// Mapper applied to a source's fault, recovering it into a stored value.
pub type ErrorMapper<T, E> = Box<dyn FnOnce(E) -> Option<T> + Send>;

/// One asynchronous source: an invocation plus optional outcome mappers.
///
/// The invoke future reports exactly one outcome, a success value or a
/// fault. `on_success` maps the success value into the value actually
/// stored in the result (identity when absent). `on_error` recovers a fault
/// into a stored value; when absent, a fault from this source fails the
/// whole aggregation.
///
/// Both mappers are synchronous `FnOnce` transforms. Returning `None` means
/// "no value produced": the owning key keeps its declared shape but this
/// source contributes nothing to it.
pub struct SourceSpec<T, E> {
  pub(crate) invoke: BoxFuture<'static, Result<T, E>>,
  pub(crate) on_success: Option<SuccessMapper<T>>,
  pub(crate) on_error: Option<ErrorMapper<T, E>>,
}

impl<T, E> SourceSpec<T, E> {
  /// Create a spec from the source's invoke future.
  pub fn new(invoke: impl Future<Output = Result<T, E>> + Send + 'static) -> Self {
    Self {
      invoke: Box::pin(invoke),
      on_success: None,
      on_error: None,
    }
  }

  /// Map the success value before it is stored in the result.
  pub fn on_success(mut self, map: impl FnOnce(T) -> Option<T> + Send + 'static) -> Self {
    self.on_success = Some(Box::new(map));
    self
  }

  /// Recover a fault into a stored value instead of failing the aggregation.
  pub fn on_error(mut self, recover: impl FnOnce(E) -> Option<T> + Send + 'static) -> Self {
    self.on_error = Some(Box::new(recover));
    self
  }
}

impl<T, E> fmt::Debug for SourceSpec<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SourceSpec")
      .field("on_success", &self.on_success.is_some())
      .field("on_error", &self.on_error.is_some())
      .finish_non_exhaustive()
  }
}

/// One manifest entry: the declared shape of a key plus its source(s).
pub enum ManifestEntry<T, E> {
  /// A single source; the key assembles to at most one value.
  Scalar(SourceSpec<T, E>),
  /// An ordered sequence of sources; the key assembles to a list of values.
  List(Vec<SourceSpec<T, E>>),
}

impl<T, E> fmt::Debug for ManifestEntry<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ManifestEntry::Scalar(spec) => f.debug_tuple("Scalar").field(spec).finish(),
      ManifestEntry::List(specs) => f.debug_tuple("List").field(&specs.len()).finish(),
    }
  }
}

/// The caller's declarative description of named asynchronous sources.
///
/// Built with the consuming [`Manifest::source`] / [`Manifest::sources`]
/// methods. Keys are not checked for uniqueness here; a duplicate key is
/// surfaced when the manifest is compiled.
pub struct Manifest<T, E> {
  pub(crate) entries: Vec<(String, ManifestEntry<T, E>)>,
}

impl<T, E> Manifest<T, E> {
  /// Create an empty manifest.
  pub fn new() -> Self {
    Self { entries: Vec::new() }
  }

  /// Add a scalar-shaped key backed by a single source.
  pub fn source(mut self, key: impl Into<String>, spec: SourceSpec<T, E>) -> Self {
    self.entries.push((key.into(), ManifestEntry::Scalar(spec)));
    self
  }

  /// Add a list-shaped key backed by an ordered sequence of sources.
  ///
  /// An empty sequence is valid: the key still appears in the result as an
  /// empty list.
  pub fn sources(mut self, key: impl Into<String>, specs: Vec<SourceSpec<T, E>>) -> Self {
    self.entries.push((key.into(), ManifestEntry::List(specs)));
    self
  }

  /// Number of entries (keys, counting duplicates) in the manifest.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns true if the manifest has no entries.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Keys in insertion order.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(key, _)| key.as_str())
  }
}

impl<T, E> Default for Manifest<T, E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T, E> fmt::Debug for Manifest<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map().entries(self.entries.iter().map(|(key, entry)| (key, entry))).finish()
  }
}
