//! Local APIC of the boot CPU.
//!
//! Only two registers matter here: the id (MSI destination) and EOI.

use core::ptr::{read_volatile, write_volatile};

pub const LOCAL_APIC_PHYS_BASE: u64 = 0xfee0_0000;

const ID: usize = 0x020;
const EOI: usize = 0x0b0;

/// Acknowledges the interrupt being serviced so the next one can arrive.
pub trait EndOfInterrupt {
    fn notify_end_of_interrupt(&self);
}

pub struct LocalApic {
    base: usize,
}

impl LocalApic {
    /// # Safety
    ///
    /// `base` must be a mapped, uncached virtual address of the local APIC
    /// register page, valid for the life of the returned value.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn read(&self, reg: usize) -> u32 {
        unsafe { read_volatile((self.base + reg) as *const u32) }
    }

    fn write(&self, reg: usize, value: u32) {
        unsafe { write_volatile((self.base + reg) as *mut u32, value) }
    }

    pub fn id(&self) -> u8 {
        (self.read(ID) >> 24) as u8
    }
}

impl EndOfInterrupt for LocalApic {
    fn notify_end_of_interrupt(&self) {
        self.write(EOI, 0);
    }
}
