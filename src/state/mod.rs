//! State module for tracking worker progress
//!
//! This module provides the state types that describe one crawl worker.
//!
//! # Components
//!
//! - `WorkerState`: The lifecycle state of a worker (starting, positioning, iterating, ...)
//! - `ExitReason`: Why a worker left its crawl loop
//! - `Direction`, `DirectionPolicy`, `SlotAssignment`: How a worker walks the listing

mod direction;
mod worker_state;

// Re-export main types
pub use direction::{Direction, DirectionPolicy, SlotAssignment};
pub use worker_state::{ExitReason, WorkerState};
