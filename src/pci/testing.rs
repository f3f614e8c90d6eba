//! In-memory configuration space for host tests.

use std::cell::RefCell;
use std::collections::HashMap;

use super::config::{reg, ConfigSpace};

#[derive(Default)]
pub struct SimConfigSpace {
    regs: RefCell<HashMap<(u8, u8, u8, u8), u32>>,
}

impl SimConfigSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, bus: u8, device: u8, function: u8, reg_addr: u8, value: u32) {
        self.regs
            .borrow_mut()
            .insert((bus, device, function, reg_addr & 0xfc), value);
    }

    pub fn get(&self, bus: u8, device: u8, function: u8, reg_addr: u8) -> u32 {
        self.read(bus, device, function, reg_addr)
    }

    /// Populates the id, class and header registers of one function.
    pub fn add_function(
        &self,
        (bus, device, function): (u8, u8, u8),
        vendor: u16,
        class: (u8, u8, u8),
        header_type: u8,
    ) {
        self.set(bus, device, function, reg::ID, 0x1000_0000 | vendor as u32);
        let (base, sub, interface) = class;
        self.set(
            bus,
            device,
            function,
            reg::CLASS_REVISION,
            (base as u32) << 24 | (sub as u32) << 16 | (interface as u32) << 8,
        );
        self.set(bus, device, function, reg::HEADER_TYPE, (header_type as u32) << 16);
    }

    pub fn add_bridge(&self, (bus, device, function): (u8, u8, u8), secondary: u8) {
        self.add_function((bus, device, function), 0x8086, (0x06, 0x04, 0x00), 0x01);
        self.set(
            bus,
            device,
            function,
            reg::BUS_NUMBERS,
            (secondary as u32) << 16 | (secondary as u32) << 8 | bus as u32,
        );
    }
}

impl ConfigSpace for SimConfigSpace {
    fn read(&self, bus: u8, device: u8, function: u8, reg_addr: u8) -> u32 {
        self.regs
            .borrow()
            .get(&(bus, device, function, reg_addr & 0xfc))
            .copied()
            .unwrap_or(0xffff_ffff)
    }

    fn write(&self, bus: u8, device: u8, function: u8, reg_addr: u8, value: u32) {
        self.set(bus, device, function, reg_addr, value);
    }
}
