//! Device Subsystem
//!
//! - `controller`: the host controller contract the kernel core drives
//! - `drivers`: concrete controller drivers

pub mod controller;
pub mod drivers;

pub use controller::{HostController, RootPort};

#[cfg(test)]
pub(crate) mod testing;
