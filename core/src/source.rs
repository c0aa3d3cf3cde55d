// pipeloop/src/source.rs

//! Iterator-fed source stages.
//!
//! A loop has no built-in notion of "input exhausted": it runs until Stopping
//! fires. `from_iter` bridges the two by firing Stopping as the last element is
//! handed out, so the loop processes every element exactly once and then drains.

use crate::builder::ValueLoopBuilder;
use parking_lot::Mutex;
use std::any::Any;
use std::iter::Peekable;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

/// A shared cursor over an iterator that fires `stopping` when it runs dry.
pub struct IterSource<I: Iterator> {
  items: Mutex<Peekable<I>>,
  stopping: CancellationToken,
}

impl<I: Iterator> IterSource<I> {
  pub fn new(iter: I, stopping: CancellationToken) -> Self {
    let mut items = iter.peekable();
    if items.peek().is_none() {
      event!(Level::DEBUG, "Source iterator is empty; firing Stopping.");
      stopping.cancel();
    }
    Self {
      items: Mutex::new(items),
      stopping,
    }
  }

  /// Hands out the next element, firing Stopping if no element follows it.
  pub fn next_item(&self) -> Option<I::Item> {
    let mut items = self.items.lock();
    let item = items.next();
    if items.peek().is_none() && !self.stopping.is_cancelled() {
      event!(Level::DEBUG, "Source iterator exhausted; firing Stopping.");
      self.stopping.cancel();
    }
    item
  }
}

/// Starts a typed pipeline whose first stage yields the elements of `iter`, one
/// per iteration, and fires `stopping` when it hands out the last one.
///
/// Pass the same `stopping` token to [`RunOptions::new`](crate::RunOptions::new).
/// If the iterator is empty, `stopping` fires immediately and the run resolves
/// without executing any stage.
pub fn from_iter<I>(iter: I, stopping: CancellationToken) -> ValueLoopBuilder<I::Item>
where
  I: Iterator + Send + 'static,
  I::Item: Any + Send + Sync + Clone,
{
  let source = Arc::new(IterSource::new(iter, stopping));
  ValueLoopBuilder::begin_with_inline(move || {
    source
      .next_item()
      .ok_or_else(|| anyhow::anyhow!("Source iterator invoked after it was exhausted"))
  })
}
