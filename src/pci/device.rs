use core::fmt;

use crate::error::{Code, Error, Result};

/// Base class / subclass / programming interface of one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassCode {
    pub base: u8,
    pub sub: u8,
    pub interface: u8,
}

impl ClassCode {
    pub const fn new(base: u8, sub: u8, interface: u8) -> Self {
        Self { base, sub, interface }
    }

    /// Decodes the class/revision register (offset 0x08).
    pub const fn from_register(reg: u32) -> Self {
        Self {
            base: (reg >> 24) as u8,
            sub: (reg >> 16) as u8,
            interface: (reg >> 8) as u8,
        }
    }

    pub fn match_base(&self, b: u8) -> bool {
        b == self.base
    }

    pub fn match_sub(&self, b: u8, s: u8) -> bool {
        self.match_base(b) && s == self.sub
    }

    pub fn match_interface(&self, b: u8, s: u8, i: u8) -> bool {
        self.match_sub(b, s) && i == self.interface
    }

    /// Standard PCI-to-PCI bridge.
    pub fn is_pci_bridge(&self) -> bool {
        self.match_sub(0x06, 0x04)
    }
}

/// One discovered function. Plain value, copied wherever it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Device {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
    pub header_type: u8,
    pub class_code: ClassCode,
}

impl Device {
    pub const fn new(
        bus: u8,
        device: u8,
        function: u8,
        header_type: u8,
        class_code: ClassCode,
    ) -> Self {
        Self {
            bus,
            device,
            function,
            header_type,
            class_code,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}: head {:02x}, class {:02x}.{:02x}.{:02x}",
            self.bus,
            self.device,
            self.function,
            self.header_type,
            self.class_code.base,
            self.class_code.sub,
            self.class_code.interface
        )
    }
}

/// Fixed-capacity, insertion-ordered list of discovered functions.
pub struct DeviceTable<const N: usize> {
    devices: [Device; N],
    count: usize,
}

impl<const N: usize> DeviceTable<N> {
    pub const fn new() -> Self {
        Self {
            devices: [Device::new(0, 0, 0, 0, ClassCode::new(0, 0, 0)); N],
            count: 0,
        }
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn push(&mut self, device: Device) -> Result<()> {
        if self.count == N {
            return Err(Error::new(Code::Full));
        }

        self.devices[self.count] = device;
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn as_slice(&self) -> &[Device] {
        &self.devices[..self.count]
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Device> {
        self.as_slice().iter()
    }
}

impl<const N: usize> Default for DeviceTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_code_matches_hierarchically() {
        let cc = ClassCode::new(0x0c, 0x03, 0x30);

        assert!(cc.match_base(0x0c));
        assert!(!cc.match_base(0x06));

        assert!(cc.match_sub(0x0c, 0x03));
        assert!(!cc.match_sub(0x0c, 0x04));
        assert!(!cc.match_sub(0x06, 0x03));

        assert!(cc.match_interface(0x0c, 0x03, 0x30));
        assert!(!cc.match_interface(0x0c, 0x03, 0x20));
        assert!(!cc.match_interface(0x0d, 0x03, 0x30));
    }

    #[test]
    fn class_code_from_register() {
        let cc = ClassCode::from_register(0x0604_0001);
        assert_eq!(cc, ClassCode::new(0x06, 0x04, 0x00));
        assert!(cc.is_pci_bridge());
        assert!(!ClassCode::new(0x06, 0x00, 0x00).is_pci_bridge());
    }

    #[test]
    fn table_rejects_overflow() {
        let mut table = DeviceTable::<2>::new();
        let a = Device::new(0, 1, 0, 0, ClassCode::new(1, 1, 0));
        let b = Device::new(0, 2, 0, 0, ClassCode::new(2, 0, 0));
        let c = Device::new(0, 3, 0, 0, ClassCode::new(3, 0, 0));

        assert!(table.push(a).is_ok());
        assert!(table.push(b).is_ok());
        assert_eq!(table.push(c).unwrap_err(), Code::Full);
        assert_eq!(table.as_slice(), &[a, b]);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 2);
    }
}
