//! Kosmos: PCI discovery, MSI routing and interrupt-driven event dispatch
//! for a small x86_64 kernel.
//!
//! The library builds for the host under `cargo test`; everything that
//! touches ports, control registers or MMIO sits behind a trait so it can be
//! simulated there.

#![cfg_attr(not(test), no_std)]
#![feature(abi_x86_interrupt)]

pub mod config;
pub mod data_structures;
pub mod devices;
pub mod error;
pub mod interrupts;
pub mod kernel;
pub mod logger;
pub mod memory;
pub mod pci;
