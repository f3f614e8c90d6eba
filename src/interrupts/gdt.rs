//! Flat 64-bit GDT plus a TSS carrying the double-fault stack.
//!
//! ```text
//! 0x00  null
//! 0x08  kernel code   <- every IDT gate
//! 0x10  kernel data   <- DS, ES, SS
//! 0x18  TSS (16 bytes)
//! ```

use spin::Lazy;
use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};
use x86_64::instructions::tables::load_tss;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

/// TSS slot of the double-fault stack. Gate descriptors store it plus one.
pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

const DOUBLE_FAULT_STACK_SIZE: usize = 4096 * 5;

#[repr(align(16))]
struct Stack([u8; DOUBLE_FAULT_STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: Stack = Stack([0; DOUBLE_FAULT_STACK_SIZE]);

static TSS: Lazy<TaskStateSegment> = Lazy::new(|| {
    let mut tss = TaskStateSegment::new();
    // Stacks grow down: the IST entry holds the top.
    let bottom = VirtAddr::new(core::ptr::addr_of!(DOUBLE_FAULT_STACK) as u64);
    tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
        bottom + DOUBLE_FAULT_STACK_SIZE as u64;
    tss
});

#[derive(Clone, Copy)]
struct KernelSelectors {
    code: SegmentSelector,
    data: SegmentSelector,
    tss: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, KernelSelectors)> = Lazy::new(|| {
    let mut gdt = GlobalDescriptorTable::new();
    let selectors = KernelSelectors {
        code: gdt.append(Descriptor::kernel_code_segment()),
        data: gdt.append(Descriptor::kernel_data_segment()),
        tss: gdt.append(Descriptor::tss_segment(&TSS)),
    };
    (gdt, selectors)
});

/// Loads the table, reloads every segment register and the task register.
pub fn init() {
    let (gdt, selectors) = &*GDT;
    gdt.load();

    unsafe {
        CS::set_reg(selectors.code);
        DS::set_reg(selectors.data);
        ES::set_reg(selectors.data);
        SS::set_reg(selectors.data);
        load_tss(selectors.tss);
    }
}

/// Raw selector value for gate descriptors.
pub fn kernel_code_selector() -> u16 {
    GDT.1.code.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_follow_table_order() {
        let selectors = GDT.1;

        assert_eq!(kernel_code_selector(), 0x08);
        assert_eq!(selectors.data.0, 0x10);
        assert_eq!(selectors.tss.0, 0x18);
    }

    #[test]
    fn double_fault_stack_top() {
        let top = TSS.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize].as_u64();
        let bottom = core::ptr::addr_of!(DOUBLE_FAULT_STACK) as u64;

        assert_eq!(top - bottom, DOUBLE_FAULT_STACK_SIZE as u64);
        assert_eq!(top % 16, 0);
    }
}
