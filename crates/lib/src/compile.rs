//! Manifest compilation.
//!
//! Flattens a manifest into a flat ordered collection of invocation units
//! plus a shape descriptor recording whether each key assembles to a scalar
//! or a list. Pure data transformation, no I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::{Manifest, ManifestEntry, SourceSpec};

/// Errors that can occur during manifest compilation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
  /// The same key was declared more than once in the manifest.
  #[error("duplicate manifest key: {0}")]
  DuplicateKey(String),
}

/// The assembled shape of one manifest key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
  /// At most one value; assembles to the value or an absent marker.
  Scalar,
  /// Zero or more values in declaration order.
  List,
}

/// The declared shape of every manifest key.
///
/// Uses [`BTreeMap`] for deterministic iteration and serialization order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDescriptor(pub BTreeMap<String, Shape>);

impl ShapeDescriptor {
  /// Shape of a key, if the key was declared.
  pub fn get(&self, key: &str) -> Option<Shape> {
    self.0.get(key).copied()
  }

  /// Number of declared keys.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Returns true if no keys were declared.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Iterate over declared keys and their shapes.
  pub fn iter(&self) -> impl Iterator<Item = (&String, Shape)> {
    self.0.iter().map(|(key, shape)| (key, *shape))
  }
}

/// A compiled, key-tagged instance of a source spec ready to execute.
///
/// Immutable once compiled. A unit's index in the compiled sequence fixes
/// its position within the owning key's list.
pub struct InvocationUnit<T, E> {
  pub(crate) key: String,
  pub(crate) spec: SourceSpec<T, E>,
}

impl<T, E> InvocationUnit<T, E> {
  /// The manifest key this unit belongs to.
  pub fn key(&self) -> &str {
    &self.key
  }
}

impl<T, E> fmt::Debug for InvocationUnit<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InvocationUnit")
      .field("key", &self.key)
      .field("spec", &self.spec)
      .finish()
  }
}

/// Compile a manifest into ordered invocation units and a shape descriptor.
///
/// - A [`ManifestEntry::Scalar`] entry produces one unit and registers the
///   key as scalar-shaped.
/// - A [`ManifestEntry::List`] entry produces one unit per element, in
///   element order, and registers the key as list-shaped. An empty list
///   registers the shape and produces no units.
///
/// Units sharing a key keep their relative list order; across keys, units
/// keep manifest insertion order.
///
/// # Errors
///
/// A key declared twice fails fast with [`CompileError::DuplicateKey`]; a
/// second declaration is never silently dropped or merged. (A spec missing
/// its invoke operation is unrepresentable: [`SourceSpec::new`] requires
/// the future.)
pub fn compile<T, E>(
  manifest: Manifest<T, E>,
) -> Result<(Vec<InvocationUnit<T, E>>, ShapeDescriptor), CompileError> {
  let mut units = Vec::new();
  let mut shapes = BTreeMap::new();

  for (key, entry) in manifest.entries {
    let shape = match &entry {
      ManifestEntry::Scalar(_) => Shape::Scalar,
      ManifestEntry::List(_) => Shape::List,
    };

    if shapes.insert(key.clone(), shape).is_some() {
      return Err(CompileError::DuplicateKey(key));
    }

    match entry {
      ManifestEntry::Scalar(spec) => {
        units.push(InvocationUnit { key, spec });
      }
      ManifestEntry::List(specs) => {
        units.extend(specs.into_iter().map(|spec| InvocationUnit { key: key.clone(), spec }));
      }
    }
  }

  Ok((units, ShapeDescriptor(shapes)))
}
