//! Configuration space access.
//!
//! Every register is 32 bits wide and word aligned. An address that decodes
//! to no device reads back as all ones; callers treat a vendor id of
//! `0xffff` as "nothing here".

use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::error::{Code, Error, Result};
use crate::pci::device::{ClassCode, Device};

pub const CONFIG_ADDRESS: u16 = 0x0cf8;
pub const CONFIG_DATA: u16 = 0x0cfc;

/// Vendor id read back for an empty slot.
pub const INVALID_VENDOR_ID: u16 = 0xffff;

/// Register offsets in the common configuration header.
pub mod reg {
    pub const ID: u8 = 0x00;
    pub const STATUS_COMMAND: u8 = 0x04;
    pub const CLASS_REVISION: u8 = 0x08;
    pub const HEADER_TYPE: u8 = 0x0c;
    pub const BAR0: u8 = 0x10;
    /// Type 1 header: primary / secondary / subordinate bus numbers.
    pub const BUS_NUMBERS: u8 = 0x18;
    pub const CAPABILITY_POINTER: u8 = 0x34;
}

/// Status register: capabilities list present.
pub const STATUS_CAPABILITY_LIST: u32 = 1 << (16 + 4);

/// Builds the CONFIG_ADDRESS word for one register of one function.
pub const fn make_address(bus: u8, device: u8, function: u8, reg_addr: u8) -> u32 {
    (1 << 31)
        | ((bus as u32) << 16)
        | (((device as u32) & 0x1f) << 11)
        | (((function as u32) & 0x07) << 8)
        | ((reg_addr as u32) & 0xfc)
}

pub const fn bar_address(bar_index: u32) -> u8 {
    (0x10 + 4 * bar_index) as u8
}

pub const fn is_single_function_device(header_type: u8) -> bool {
    header_type & 0x80 == 0
}

/// Raw register access plus the typed reads built on it.
///
/// The kernel uses [`PortConfigSpace`]; anything implementing `read` and
/// `write` gets the rest for free.
pub trait ConfigSpace {
    fn read(&self, bus: u8, device: u8, function: u8, reg_addr: u8) -> u32;
    fn write(&self, bus: u8, device: u8, function: u8, reg_addr: u8, value: u32);

    fn vendor_id(&self, bus: u8, device: u8, function: u8) -> u16 {
        (self.read(bus, device, function, reg::ID) & 0xffff) as u16
    }

    fn device_id(&self, bus: u8, device: u8, function: u8) -> u16 {
        (self.read(bus, device, function, reg::ID) >> 16) as u16
    }

    fn header_type(&self, bus: u8, device: u8, function: u8) -> u8 {
        ((self.read(bus, device, function, reg::HEADER_TYPE) >> 16) & 0xff) as u8
    }

    fn class_code(&self, bus: u8, device: u8, function: u8) -> ClassCode {
        ClassCode::from_register(self.read(bus, device, function, reg::CLASS_REVISION))
    }

    fn bus_numbers(&self, bus: u8, device: u8, function: u8) -> u32 {
        self.read(bus, device, function, reg::BUS_NUMBERS)
    }

    fn read_conf_reg(&self, dev: &Device, reg_addr: u8) -> u32 {
        self.read(dev.bus, dev.device, dev.function, reg_addr)
    }

    fn write_conf_reg(&self, dev: &Device, reg_addr: u8, value: u32) {
        self.write(dev.bus, dev.device, dev.function, reg_addr, value)
    }

    fn device_vendor_id(&self, dev: &Device) -> u16 {
        self.vendor_id(dev.bus, dev.device, dev.function)
    }

    /// Reads base address register `bar_index`, joining the upper half of a
    /// 64-bit BAR. The flag bits are left in place.
    fn read_bar(&self, dev: &Device, bar_index: u32) -> Result<u64> {
        if bar_index >= 6 {
            return Err(Error::new(Code::IndexOutOfRange));
        }

        let addr = bar_address(bar_index);
        let bar = self.read_conf_reg(dev, addr);

        // 32 bit address
        if bar & 0x4 == 0 {
            return Ok(bar as u64);
        }

        // 64 bit address
        if bar_index >= 5 {
            return Err(Error::new(Code::IndexOutOfRange));
        }

        let bar_upper = self.read_conf_reg(dev, addr + 4);
        Ok(bar as u64 | ((bar_upper as u64) << 32))
    }
}

/// Configuration mechanism #1 through the two legacy I/O ports.
pub struct PortConfigSpace {
    ports: Mutex<(Port<u32>, Port<u32>)>,
}

impl PortConfigSpace {
    pub const fn new() -> Self {
        Self {
            ports: Mutex::new((Port::new(CONFIG_ADDRESS), Port::new(CONFIG_DATA))),
        }
    }
}

impl ConfigSpace for PortConfigSpace {
    fn read(&self, bus: u8, device: u8, function: u8, reg_addr: u8) -> u32 {
        let mut ports = self.ports.lock();
        let (address, data) = &mut *ports;
        unsafe {
            address.write(make_address(bus, device, function, reg_addr));
            data.read()
        }
    }

    fn write(&self, bus: u8, device: u8, function: u8, reg_addr: u8, value: u32) {
        let mut ports = self.ports.lock();
        let (address, data) = &mut *ports;
        unsafe {
            address.write(make_address(bus, device, function, reg_addr));
            data.write(value);
        }
    }
}
