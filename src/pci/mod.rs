//! # PCI Bus Support
//!
//! Discovery and configuration of devices on the PCI configuration bus.
//!
//! ## Submodules
//!
//! - `config`: CONFIG_ADDRESS / CONFIG_DATA register access (ports 0xCF8 / 0xCFC)
//! - `device`: class codes, discovered functions and the fixed-size device table
//! - `scan`: recursive depth-first bus walk, bridges included
//! - `capability`: capability list walking
//! - `msi`: message-signaled interrupt configuration
//!
//! ## Configuration Address Layout
//!
//! ```text
//!  31  30      24 23    16 15    11 10     8 7        2 1 0
//! ┌──┬──────────┬────────┬────────┬────────┬──────────┬───┐
//! │E │ reserved │  bus   │ device │function│ register │ 0 │
//! └──┴──────────┴────────┴────────┴────────┴──────────┴───┘
//! ```

pub mod capability;
pub mod config;
pub mod device;
pub mod msi;
pub mod scan;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{find_capability, CapabilityHeader, CAPABILITY_MSI, CAPABILITY_MSIX};
pub use config::{make_address, ConfigSpace, PortConfigSpace};
pub use device::{ClassCode, Device, DeviceTable};
pub use msi::{configure_msi_fixed_destination, DeliveryMode, MsiConfig, TriggerMode};
pub use scan::{find_preferred, scan_all_bus};
