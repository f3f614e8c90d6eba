//! Compile-time kernel configuration.

use crate::logger::LogLevel;
use crate::pci::ClassCode;

/// Slots in the table filled by a full bus scan.
pub const DEVICE_TABLE_CAPACITY: usize = 32;

/// Slots in the interrupt-to-main-loop message queue.
pub const MAIN_QUEUE_CAPACITY: usize = 32;

/// Serial bus controller / USB / xHCI.
pub const XHC_CLASS: ClassCode = ClassCode::new(0x0c, 0x03, 0x30);

/// Serial bus controller / USB / EHCI.
pub const EHCI_CLASS: ClassCode = ClassCode::new(0x0c, 0x03, 0x20);

pub const INTEL_VENDOR_ID: u16 = 0x8086;

#[cfg(feature = "verbose")]
pub const BOOT_LOG_LEVEL: LogLevel = LogLevel::Debug;
#[cfg(not(feature = "verbose"))]
pub const BOOT_LOG_LEVEL: LogLevel = LogLevel::Warn;
