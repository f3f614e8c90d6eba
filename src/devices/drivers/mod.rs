//! Device Drivers
//!
//! - xHCI USB host controller (MSI vector 0x40)

pub mod xhci;

pub use xhci::{DmaMemory, XhciController, XhciPort};
