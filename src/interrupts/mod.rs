//! # Interrupt Handling Module
//!
//! - **GDT**: flat segments and the TSS with the double-fault stack
//! - **IDT**: 256-entry gate table, built by hand and loaded with `lidt`
//! - **APIC**: local APIC id (MSI destination) and end-of-interrupt
//! - **PIC**: legacy 8259 pair, remapped and masked
//! - **CPU**: interrupt flag control for the main loop
//!
//! ## Vector Layout
//!
//! | Vector | Type            | Handler                   |
//! |--------|-----------------|---------------------------|
//! | 0-31   | CPU Exceptions  | `exceptions`              |
//! | 32-47  | Legacy PIC      | masked, never delivered   |
//! | 0x40   | xHCI MSI        | `xhci_interrupt_handler`  |
//!
//! ## Ordering
//!
//! Every device vector must be installed and the table loaded before
//! interrupts are enabled for the first time.

pub mod apic;
pub mod cpu;
pub mod exceptions;
pub mod gdt;
pub mod idt;
pub mod pic;

use spin::Mutex;

use crate::interrupts::idt::InterruptDescriptorTable;

pub use apic::{EndOfInterrupt, LocalApic};
pub use cpu::{InterruptControl, X86Interrupts};
pub use idt::InterruptVector;

/// The table IDTR points at. Lives in a static so its address never changes.
pub static IDT: Mutex<InterruptDescriptorTable> = Mutex::new(InterruptDescriptorTable::new());

/// GDT/TSS, legacy PIC masking, exception gates. Interrupts stay disabled.
pub fn init() {
    gdt::init();
    pic::disable_legacy();

    let mut idt = IDT.lock();
    exceptions::install(&mut idt, gdt::kernel_code_selector());
    unsafe { idt.load() };
}

/// Installs `handler_address` at `vector` and reloads the table.
pub fn install_device_handler(vector: InterruptVector, handler_address: u64) {
    let mut idt = IDT.lock();
    idt.install_handler(vector.as_u8(), handler_address, gdt::kernel_code_selector(), 0);
    unsafe { idt.load() };
}
