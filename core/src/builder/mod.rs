// pipeloop/src/builder/mod.rs

//! Typed, fluent construction of pipelines.
//!
//! `LoopBuilder` is used while no value flows; the first producing stage turns
//! it into a `ValueLoopBuilder<T>`. Both wrap a [`Pipeline`](crate::Pipeline)
//! and append through `&self`, so every intermediate builder stays usable.

pub(crate) mod bodies;
pub mod unit;
pub mod value;

pub use unit::LoopBuilder;
pub use value::ValueLoopBuilder;
