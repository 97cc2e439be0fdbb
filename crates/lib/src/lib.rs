//! manifold-lib: Keyed aggregation of concurrent asynchronous sources
//!
//! This crate provides the fundamental types used throughout Manifold:
//! - `Manifest`: the caller's declarative description of named async sources
//! - `SourceSpec`: one asynchronous invocation plus optional success/error mappers
//! - `compile`: flattens a manifest into ordered invocation units
//! - `execute`: runs all units concurrently and gathers their outcomes
//! - `assemble`: folds unit outcomes into the final aggregate result

pub mod assemble;
pub mod compile;
pub mod execute;
pub mod manifest;
