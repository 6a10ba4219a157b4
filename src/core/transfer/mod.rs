//! The transfer subsystem: chunk partitioning, the parallel copy
//! engine, progress tracking, and the controller state machine that
//! ties them to the UI loop.

pub mod chunk;
pub mod controller;
pub mod engine;
pub mod job;
pub mod progress;
