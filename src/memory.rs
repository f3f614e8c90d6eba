//! Physical/virtual address translation.
//!
//! The boot loader maps all of physical memory at a fixed offset. MMIO
//! (local APIC, controller BARs) is reached through that window, and DMA
//! structures embedded in the kernel image are translated back to physical
//! addresses through the active page table.

use core::sync::atomic::{AtomicU64, Ordering};

use x86_64::structures::paging::{OffsetPageTable, PageTable, Translate};
use x86_64::VirtAddr;

static PHYSICAL_MEMORY_OFFSET: AtomicU64 = AtomicU64::new(0);

pub fn init(physical_memory_offset: u64) {
    PHYSICAL_MEMORY_OFFSET.store(physical_memory_offset, Ordering::Release);
}

pub fn physical_memory_offset() -> u64 {
    PHYSICAL_MEMORY_OFFSET.load(Ordering::Acquire)
}

pub fn phys_to_virt(phys: u64) -> u64 {
    phys + physical_memory_offset()
}

/// # Safety
///
/// Physical memory must be mapped at the offset given to [`init`], and the
/// returned table must not be used to create aliasing mutable references.
pub unsafe fn active_page_table() -> OffsetPageTable<'static> {
    let (level_4_frame, _) = x86_64::registers::control::Cr3::read();
    let phys = level_4_frame.start_address();
    let offset = physical_memory_offset();
    let virt = VirtAddr::new(phys.as_u64() + offset);
    let page_table_ptr: *mut PageTable = virt.as_mut_ptr();

    OffsetPageTable::new(&mut *page_table_ptr, VirtAddr::new(offset))
}

pub fn virt_to_phys(virt: u64) -> Option<u64> {
    let mapping = unsafe { active_page_table() };
    mapping
        .translate_addr(VirtAddr::new(virt))
        .map(|pa| pa.as_u64())
}
