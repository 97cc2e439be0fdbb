//! Parallel source invocation.
//!
//! This module provides the engine that runs compiled invocation units and
//! the top-level [`aggregate`] entry point. It handles:
//! - Immediate fan-out of all units (no unit's start waits on another)
//! - Per-unit fault isolation for invoke futures and mapping callbacks
//! - First-fault short-circuit without cancelling in-flight siblings
//! - Deterministic outcome ordering for result assembly

pub mod types;

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::assemble::{AggregateResult, assemble};
use crate::compile::{InvocationUnit, compile};
use crate::manifest::{Manifest, SourceSpec};

pub use types::{AggregateError, UnitOutcome};

/// Aggregate every source in a manifest into a single keyed result.
///
/// Compiles the manifest, runs all invocation units concurrently, and
/// assembles their outcomes. Completes exactly once, with either a fully
/// assembled result or the first unhandled fault; never both, and never a
/// partial result.
///
/// # Errors
///
/// Returns [`AggregateError::Compile`] for a malformed manifest, or the
/// first unhandled fault observed while running units (see [`run`]).
pub async fn aggregate<T, E>(manifest: Manifest<T, E>) -> Result<AggregateResult<T>, AggregateError<E>>
where
  T: Send + 'static,
  E: Send + 'static,
{
  let (units, shapes) = compile(manifest)?;

  info!(keys = shapes.len(), units = units.len(), "starting aggregation");

  let outcomes = run(units).await?;
  let result = assemble(&shapes, outcomes);

  info!(keys = result.len(), "aggregation complete");

  Ok(result)
}

/// Run all invocation units concurrently and collect their outcomes.
///
/// Every unit is spawned into its own supervised task before any completion
/// is awaited, so no unit's start is delayed by another's completion. Each
/// unit's invoke-await and mapper calls run under a single fault boundary:
/// a panic anywhere on that path becomes that unit's keyed error without
/// touching sibling tasks or the process.
///
/// The first unhandled fault observed, in completion order, resolves the
/// call with that fault. Remaining tasks are detached, not aborted: no
/// cancellation signal is propagated, their eventual outcomes are simply
/// discarded. With no unhandled fault, outcomes are returned in compiled
/// unit order regardless of completion order.
///
/// Must be called from within a Tokio runtime.
pub async fn run<T, E>(units: Vec<InvocationUnit<T, E>>) -> Result<Vec<UnitOutcome<T>>, AggregateError<E>>
where
  T: Send + 'static,
  E: Send + 'static,
{
  let total = units.len();
  let mut join_set = JoinSet::new();
  let mut unit_keys: HashMap<tokio::task::Id, String> = HashMap::with_capacity(total);

  for (index, unit) in units.into_iter().enumerate() {
    let key = unit.key().to_string();
    let handle = join_set.spawn(invoke_unit(index, unit));
    unit_keys.insert(handle.id(), key);
  }

  let mut slots: Vec<Option<UnitOutcome<T>>> = Vec::with_capacity(total);
  slots.resize_with(total, || None);

  while let Some(joined) = join_set.join_next_with_id().await {
    match joined {
      Ok((_, Ok((index, outcome)))) => {
        debug!(key = %outcome.key, produced = outcome.value.is_some(), "source completed");
        slots[index] = Some(outcome);
      }
      Ok((_, Err(err))) => {
        error!(key = err.key().unwrap_or_default(), "unhandled fault, aggregation failed");
        discard_in_flight(join_set);
        return Err(err);
      }
      Err(join_err) => {
        // Backstop: the per-unit boundary catches panics on the completion
        // path, so reaching this arm means the task itself died.
        let key = unit_keys.get(&join_err.id()).cloned().unwrap_or_default();
        error!(key = %key, "source task panicked, aggregation failed");
        let message = join_error_message(join_err);
        discard_in_flight(join_set);
        return Err(AggregateError::Panicked { key, message });
      }
    }
  }

  let outcomes: Vec<UnitOutcome<T>> = slots.into_iter().flatten().collect();
  debug_assert_eq!(outcomes.len(), total);

  Ok(outcomes)
}

/// Invoke a single unit inside its own fault boundary.
///
/// The invoke future and both mappers run under one `catch_unwind`, so any
/// panic on the unit's completion path is converted into the unit's own
/// keyed error. Mapper precedence follows the source contract: a success
/// value goes through `on_success` (identity when absent); a fault goes
/// through `on_error` when present and is unhandled otherwise. A panicking
/// mapper is never re-routed through `on_error`.
async fn invoke_unit<T, E>(
  index: usize,
  unit: InvocationUnit<T, E>,
) -> Result<(usize, UnitOutcome<T>), AggregateError<E>>
where
  T: Send + 'static,
  E: Send + 'static,
{
  let InvocationUnit { key, spec } = unit;
  let SourceSpec {
    invoke,
    on_success,
    on_error,
  } = spec;

  let outcome = AssertUnwindSafe(async move {
    match invoke.await {
      Ok(res) => match on_success {
        Some(map) => Ok(map(res)),
        None => Ok(Some(res)),
      },
      Err(fault) => match on_error {
        Some(recover) => Ok(recover(fault)),
        None => Err(fault),
      },
    }
  })
  .catch_unwind()
  .await;

  match outcome {
    Ok(Ok(value)) => Ok((index, UnitOutcome { key, value })),
    Ok(Err(fault)) => Err(AggregateError::Fault { key, fault }),
    Err(payload) => Err(AggregateError::Panicked {
      message: panic_message(payload.as_ref()),
      key,
    }),
  }
}

/// Stop waiting on remaining tasks without cancelling them.
fn discard_in_flight<O: 'static>(mut join_set: JoinSet<O>) {
  if !join_set.is_empty() {
    warn!(in_flight = join_set.len(), "discarding outcomes of in-flight sources");
  }
  join_set.detach_all();
}

/// Extract a human-readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

/// Extract a message from a task that died before reporting.
fn join_error_message(err: JoinError) -> String {
  match err.try_into_panic() {
    Ok(payload) => panic_message(payload.as_ref()),
    Err(err) => err.to_string(),
  }
}
