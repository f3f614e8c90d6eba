//! Capability list walking.
//!
//! Each node is one dword: id in bits 7:0, next pointer in bits 15:8 and a
//! capability-specific half in bits 31:16. A next pointer of zero ends the
//! list.

use crate::pci::config::{reg, ConfigSpace, STATUS_CAPABILITY_LIST};
use crate::pci::device::Device;

pub const CAPABILITY_MSI: u8 = 0x05;
pub const CAPABILITY_MSIX: u8 = 0x11;

/// Capabilities live after the standard 64-byte header.
const FIRST_CAPABILITY_OFFSET: u8 = 0x40;

/// Hop limit for malformed (cyclic) lists. Same bound Linux uses.
const MAX_CAPABILITIES: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityHeader(u32);

impl CapabilityHeader {
    pub const fn from_raw(data: u32) -> Self {
        Self(data)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn id(self) -> u8 {
        self.0 as u8
    }

    pub const fn next_ptr(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn cap(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

pub fn read_capability_header<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    addr: u8,
) -> CapabilityHeader {
    CapabilityHeader::from_raw(config.read_conf_reg(dev, addr))
}

/// Offset of the first capability with id `target_id`, if the device has one.
pub fn find_capability<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    target_id: u8,
) -> Option<u8> {
    if config.read_conf_reg(dev, reg::STATUS_COMMAND) & STATUS_CAPABILITY_LIST == 0 {
        return None;
    }

    let mut cap_addr = (config.read_conf_reg(dev, reg::CAPABILITY_POINTER) & 0xfc) as u8;
    for _ in 0..MAX_CAPABILITIES {
        if cap_addr < FIRST_CAPABILITY_OFFSET {
            return None;
        }

        let header = read_capability_header(config, dev, cap_addr);
        if header.id() == target_id {
            return Some(cap_addr);
        }
        cap_addr = header.next_ptr() & 0xfc;
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pci::config::reg;
    use crate::pci::device::ClassCode;
    use crate::pci::testing::SimConfigSpace;

    pub(crate) fn device() -> Device {
        Device::new(0, 4, 0, 0, ClassCode::new(0x0c, 0x03, 0x30))
    }

    /// Power management at 0x40, then `msi_id` at 0x50, then vendor at 0x70.
    pub(crate) fn with_capabilities(msi_id: u8) -> SimConfigSpace {
        let space = SimConfigSpace::new();
        space.add_function((0, 4, 0), 0x8086, (0x0c, 0x03, 0x30), 0x00);
        space.set(0, 4, 0, reg::STATUS_COMMAND, 0x0010_0006);
        space.set(0, 4, 0, reg::CAPABILITY_POINTER, 0x40);
        space.set(0, 4, 0, 0x40, 0x0003_5001);
        space.set(0, 4, 0, 0x50, 0x0000_7000 | msi_id as u32);
        space.set(0, 4, 0, 0x70, 0x0000_0009);
        space
    }

    #[test]
    fn header_fields() {
        let header = CapabilityHeader::from_raw(0x0086_7005);
        assert_eq!(header.id(), CAPABILITY_MSI);
        assert_eq!(header.next_ptr(), 0x70);
        assert_eq!(header.cap(), 0x0086);
    }

    #[test]
    fn finds_capability_mid_list() {
        let space = with_capabilities(CAPABILITY_MSI);
        assert_eq!(find_capability(&space, &device(), CAPABILITY_MSI), Some(0x50));
        assert_eq!(find_capability(&space, &device(), 0x09), Some(0x70));
        assert_eq!(find_capability(&space, &device(), 0x01), Some(0x40));
    }

    #[test]
    fn missing_capability_ends_at_null_pointer() {
        let space = with_capabilities(CAPABILITY_MSIX);
        assert_eq!(find_capability(&space, &device(), CAPABILITY_MSI), None);
    }

    #[test]
    fn no_capability_list_advertised() {
        let space = with_capabilities(CAPABILITY_MSI);
        space.set(0, 4, 0, reg::STATUS_COMMAND, 0x0000_0006);
        assert_eq!(find_capability(&space, &device(), CAPABILITY_MSI), None);
    }

    #[test]
    fn cyclic_list_terminates() {
        let space = with_capabilities(CAPABILITY_MSIX);
        // 0x70 points back to 0x40.
        space.set(0, 4, 0, 0x70, 0x0000_4009);
        assert_eq!(find_capability(&space, &device(), CAPABILITY_MSI), None);
    }

    #[test]
    fn pointer_into_header_is_rejected() {
        let space = with_capabilities(CAPABILITY_MSIX);
        space.set(0, 4, 0, 0x70, 0x0000_0809);
        assert_eq!(find_capability(&space, &device(), CAPABILITY_MSI), None);
    }
}
