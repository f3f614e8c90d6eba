//! # Interrupt Descriptor Table
//!
//! 256 gate descriptors indexed by vector. Entries nobody installs stay
//! not-present; a vector hitting one of them raises #GP (or #DF).
//!
//! ## Gate Descriptor Layout (16 bytes)
//!
//! ```text
//! 0x0 │ offset 15:0        │ segment selector │
//! 0x4 │ attributes         │ offset 31:16     │
//! 0x8 │ offset 63:32                          │
//! 0xc │ reserved                              │
//! ```
//!
//! ## Attribute Word
//!
//! | Bits  | Field                        |
//! |-------|------------------------------|
//! | 2:0   | interrupt stack table index  |
//! | 11:8  | gate type                    |
//! | 14:13 | descriptor privilege level   |
//! | 15    | present                      |

use core::mem::size_of;

use x86_64::structures::DescriptorTablePointer;
use x86_64::VirtAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DescriptorType {
    Upper8Bytes = 0,
    Ldt = 2,
    TssAvailable = 9,
    TssBusy = 11,
    CallGate = 12,
    InterruptGate = 14,
    TrapGate = 15,
}

impl DescriptorType {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(DescriptorType::Upper8Bytes),
            2 => Some(DescriptorType::Ldt),
            9 => Some(DescriptorType::TssAvailable),
            11 => Some(DescriptorType::TssBusy),
            12 => Some(DescriptorType::CallGate),
            14 => Some(DescriptorType::InterruptGate),
            15 => Some(DescriptorType::TrapGate),
            _ => None,
        }
    }
}

/// Vectors wired to device interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptVector {
    Xhci = 0x40,
}

impl InterruptVector {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct InterruptDescriptorAttribute(u16);

impl InterruptDescriptorAttribute {
    pub const fn new(
        descriptor_type: DescriptorType,
        descriptor_privilege_level: u8,
        present: bool,
        interrupt_stack_table: u8,
    ) -> Self {
        Self(
            (interrupt_stack_table as u16 & 0x7)
                | ((descriptor_type as u16) << 8)
                | ((descriptor_privilege_level as u16 & 0x3) << 13)
                | ((present as u16) << 15),
        )
    }

    /// Present interrupt gate on the current stack.
    pub const fn interrupt_gate(descriptor_privilege_level: u8) -> Self {
        Self::new(DescriptorType::InterruptGate, descriptor_privilege_level, true, 0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn interrupt_stack_table(self) -> u8 {
        (self.0 & 0x7) as u8
    }

    pub fn descriptor_type(self) -> Option<DescriptorType> {
        DescriptorType::from_bits(((self.0 >> 8) & 0xf) as u8)
    }

    pub const fn descriptor_privilege_level(self) -> u8 {
        ((self.0 >> 13) & 0x3) as u8
    }

    pub const fn present(self) -> bool {
        self.0 & (1 << 15) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct InterruptDescriptor {
    offset_low: u16,
    segment_selector: u16,
    attr: InterruptDescriptorAttribute,
    offset_middle: u16,
    offset_high: u32,
    reserved: u32,
}

const _: () = assert!(size_of::<InterruptDescriptor>() == 16);

impl InterruptDescriptor {
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            segment_selector: 0,
            attr: InterruptDescriptorAttribute::from_bits(0),
            offset_middle: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    pub fn set(&mut self, attr: InterruptDescriptorAttribute, offset: u64, segment_selector: u16) {
        self.attr = attr;
        self.offset_low = (offset & 0xffff) as u16;
        self.offset_middle = ((offset >> 16) & 0xffff) as u16;
        self.offset_high = (offset >> 32) as u32;
        self.segment_selector = segment_selector;
    }

    pub fn handler_address(&self) -> u64 {
        self.offset_low as u64 | (self.offset_middle as u64) << 16 | (self.offset_high as u64) << 32
    }

    pub fn segment_selector(&self) -> u16 {
        self.segment_selector
    }

    pub fn attributes(&self) -> InterruptDescriptorAttribute {
        self.attr
    }

    pub fn is_present(&self) -> bool {
        self.attr.present()
    }
}

#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
    entries: [InterruptDescriptor; 256],
}

impl InterruptDescriptorTable {
    pub const fn new() -> Self {
        Self {
            entries: [InterruptDescriptor::missing(); 256],
        }
    }

    pub fn set_entry(
        &mut self,
        vector: u8,
        attr: InterruptDescriptorAttribute,
        offset: u64,
        segment_selector: u16,
    ) {
        self.entries[vector as usize].set(attr, offset, segment_selector);
    }

    /// Binds `vector` to the handler at `handler_address` through a present
    /// interrupt gate.
    pub fn install_handler(
        &mut self,
        vector: u8,
        handler_address: u64,
        code_segment: u16,
        privilege_level: u8,
    ) {
        self.set_entry(
            vector,
            InterruptDescriptorAttribute::interrupt_gate(privilege_level),
            handler_address,
            code_segment,
        );
    }

    pub fn entry(&self, vector: u8) -> &InterruptDescriptor {
        &self.entries[vector as usize]
    }

    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (size_of::<Self>() - 1) as u16,
            base: VirtAddr::new(self as *const _ as u64),
        }
    }

    /// Points IDTR at this table.
    ///
    /// # Safety
    ///
    /// The table must stay at this address, unmoved and alive, for as long
    /// as it is loaded, and every present entry must point at a valid
    /// handler.
    pub unsafe fn load(&self) {
        x86_64::instructions::tables::lidt(&self.pointer());
    }
}

impl Default for InterruptDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}
