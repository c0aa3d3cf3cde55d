// pipeloop/src/core/value.rs

//! The uniform value container passed from producing stages to consuming stages.

use crate::error::LoopError;
use std::any::{type_name, Any};
use std::sync::Arc;

/// A type-erased value produced by one stage and handed to the next consuming stage(s).
///
/// The engine never looks inside a `StageValue`; typed access only happens in the
/// builders, which downcast with [`downcast_value`]. Values are shared (`Arc`)
/// because one produced value may be handed to several consuming stages in the
/// same wavefront.
pub type StageValue = Arc<dyn Any + Send + Sync>;

/// Outcome of a single stage invocation: a value (or none), a failure, or a
/// cancellation (an error rooted in `StageCanceled`).
pub type StageOutcome = anyhow::Result<Option<StageValue>>;

pub fn wrap_value<T: Any + Send + Sync>(value: T) -> StageValue {
  Arc::new(value)
}

/// Clones the `T` stored in `value`.
pub fn downcast_value<T: Any + Send + Sync + Clone>(value: &StageValue) -> Result<T, LoopError> {
  value
    .downcast_ref::<T>()
    .cloned()
    .ok_or_else(|| LoopError::TypeMismatch {
      expected_type: type_name::<T>().to_string(),
    })
}
