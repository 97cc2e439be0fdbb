//! Result assembly.
//!
//! Folds the flat ordered collection of unit outcomes into the final
//! aggregate result. Every declared key is pre-populated with an empty
//! value of its shape, so keys that produced nothing still appear with a
//! well-defined empty value instead of being omitted.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::compile::{Shape, ShapeDescriptor};
use crate::execute::UnitOutcome;

/// The assembled value of one manifest key.
///
/// Serializes untagged: a scalar key renders as its value (`null` when
/// absent) and a list key renders as an array, so an assembled result
/// serializes to a plain keyed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AggregateValue<T> {
  /// Value of a scalar-shaped key; `None` when no value was produced.
  Scalar(Option<T>),
  /// Values of a list-shaped key, in unit order.
  List(Vec<T>),
}

impl<T> AggregateValue<T> {
  /// The scalar value, when this is a scalar key that produced one.
  pub fn as_scalar(&self) -> Option<&T> {
    match self {
      AggregateValue::Scalar(value) => value.as_ref(),
      AggregateValue::List(_) => None,
    }
  }

  /// The list of values, when this is a list-shaped key.
  pub fn as_list(&self) -> Option<&[T]> {
    match self {
      AggregateValue::List(items) => Some(items),
      AggregateValue::Scalar(_) => None,
    }
  }
}

/// The final merged result of one aggregation call.
///
/// Maps every manifest key to its assembled value. Uses [`BTreeMap`] for
/// deterministic iteration and serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregateResult<T> {
  /// Every manifest key mapped to its assembled value.
  pub values: BTreeMap<String, AggregateValue<T>>,
}

impl<T> AggregateResult<T> {
  /// The assembled value of a key.
  pub fn get(&self, key: &str) -> Option<&AggregateValue<T>> {
    self.values.get(key)
  }

  /// The value of a scalar-shaped key, when it produced one.
  pub fn scalar(&self, key: &str) -> Option<&T> {
    self.get(key).and_then(AggregateValue::as_scalar)
  }

  /// The values of a list-shaped key.
  pub fn list(&self, key: &str) -> Option<&[T]> {
    self.get(key).and_then(AggregateValue::as_list)
  }

  /// Keys of the result, in sorted order.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.values.keys().map(String::as_str)
  }

  /// Number of keys in the result.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  /// Returns true if the result has no keys.
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// Assemble unit outcomes into the final aggregate result.
///
/// Initializes every descriptor key with its empty value (absent scalar or
/// empty list), then folds outcomes in unit order. For a list-shaped key an
/// empty-marker outcome is dropped, never inserted as a hole; for a
/// scalar-shaped key the outcome's value is stored directly.
pub fn assemble<T>(shapes: &ShapeDescriptor, outcomes: Vec<UnitOutcome<T>>) -> AggregateResult<T> {
  let mut values: BTreeMap<String, AggregateValue<T>> = BTreeMap::new();

  for (key, shape) in shapes.iter() {
    let empty = match shape {
      Shape::Scalar => AggregateValue::Scalar(None),
      Shape::List => AggregateValue::List(Vec::new()),
    };
    values.insert(key.clone(), empty);
  }

  for outcome in outcomes {
    match values.get_mut(&outcome.key) {
      Some(AggregateValue::Scalar(slot)) => *slot = outcome.value,
      Some(AggregateValue::List(items)) => {
        if let Some(value) = outcome.value {
          items.push(value);
        }
      }
      // Compilation registers every unit's key, so this arm is unreachable
      // through the public pipeline.
      None => warn!(key = %outcome.key, "outcome for undeclared key discarded"),
    }
  }

  AggregateResult { values }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn shapes(entries: &[(&str, Shape)]) -> ShapeDescriptor {
    ShapeDescriptor(
      entries
        .iter()
        .map(|(key, shape)| (key.to_string(), *shape))
        .collect(),
    )
  }

  fn outcome(key: &str, value: Option<&'static str>) -> UnitOutcome<&'static str> {
    UnitOutcome {
      key: key.to_string(),
      value,
    }
  }

  #[test]
  fn assemble_prepopulates_empty_shapes() {
    let shapes = shapes(&[("foo", Shape::Scalar), ("bar", Shape::List)]);

    let result = assemble(&shapes, Vec::<UnitOutcome<&'static str>>::new());

    assert_eq!(result.len(), 2);
    assert_eq!(result.get("foo"), Some(&AggregateValue::Scalar(None)));
    assert_eq!(result.get("bar"), Some(&AggregateValue::List(Vec::new())));
  }

  #[test]
  fn assemble_stores_scalar_value() {
    let shapes = shapes(&[("foo", Shape::Scalar)]);

    let result = assemble(&shapes, vec![outcome("foo", Some("mapped"))]);

    assert_eq!(result.scalar("foo"), Some(&"mapped"));
  }

  #[test]
  fn assemble_keeps_list_order() {
    let shapes = shapes(&[("foo", Shape::List)]);
    let outcomes = vec![
      outcome("foo", Some("first")),
      outcome("foo", Some("second")),
      outcome("foo", Some("third")),
    ];

    let result = assemble(&shapes, outcomes);

    assert_eq!(result.list("foo"), Some(&["first", "second", "third"][..]));
  }

  #[test]
  fn assemble_drops_empty_markers_from_lists() {
    let shapes = shapes(&[("foo", Shape::List)]);
    let outcomes = vec![
      outcome("foo", Some("kept")),
      outcome("foo", None),
      outcome("foo", Some("also kept")),
    ];

    let result = assemble(&shapes, outcomes);

    // No holes: the empty marker vanishes rather than leaving a gap.
    assert_eq!(result.list("foo"), Some(&["kept", "also kept"][..]));
  }

  #[test]
  fn assemble_all_empty_markers_yield_empty_list() {
    let shapes = shapes(&[("foo", Shape::List)]);
    let outcomes = vec![outcome("foo", None), outcome("foo", None)];

    let result = assemble(&shapes, outcomes);

    assert_eq!(result.list("foo"), Some(&[][..]));
  }

  #[test]
  fn assemble_scalar_empty_marker_stays_absent() {
    let shapes = shapes(&[("foo", Shape::Scalar)]);

    let result = assemble(&shapes, vec![outcome("foo", None)]);

    assert_eq!(result.get("foo"), Some(&AggregateValue::Scalar(None)));
    assert_eq!(result.scalar("foo"), None);
  }

  #[test]
  fn assemble_ignores_undeclared_key() {
    let shapes = shapes(&[("foo", Shape::Scalar)]);

    let result = assemble(&shapes, vec![outcome("ghost", Some("x"))]);

    assert_eq!(result.len(), 1);
    assert_eq!(result.get("ghost"), None);
  }

  #[test]
  fn aggregate_value_accessors_respect_shape() {
    let scalar = AggregateValue::Scalar(Some("x"));
    let list = AggregateValue::List(vec!["a", "b"]);

    assert_eq!(scalar.as_scalar(), Some(&"x"));
    assert_eq!(scalar.as_list(), None);
    assert_eq!(list.as_scalar(), None);
    assert_eq!(list.as_list(), Some(&["a", "b"][..]));
  }

  #[test]
  fn aggregate_result_serializes_as_plain_object() {
    let shapes = shapes(&[("foo", Shape::Scalar), ("bar", Shape::List), ("nil", Shape::Scalar)]);
    let outcomes = vec![outcome("foo", Some("mapped")), outcome("bar", Some("x"))];

    let result = assemble(&shapes, outcomes);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(
      json,
      serde_json::json!({
        "foo": "mapped",
        "bar": ["x"],
        "nil": null,
      })
    );
  }
}
