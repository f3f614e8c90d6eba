//! # Data Structures Module
//!
//! Allocation-free containers usable from interrupt context.
//!
//! ## Modules
//!
//! - `queue`: fixed-capacity ring queue, the interrupt-to-main-loop channel

pub mod queue;

pub use queue::ArrayQueue;
