//! # CPU Exception Handlers
//!
//! | Exception              | Vector | Action                         |
//! |------------------------|--------|--------------------------------|
//! | Divide Error (#DE)     | 0      | Panic                          |
//! | Breakpoint (#BP)       | 3      | Log RIP, continue              |
//! | Invalid Opcode (#UD)   | 6      | Panic                          |
//! | Double Fault (#DF)     | 8      | Panic (IST stack)              |
//! | General Protection     | 13     | Panic with error code          |
//! | Page Fault (#PF)       | 14     | Log CR2 and error code, panic  |

use x86_64::structures::idt::{InterruptStackFrame, PageFaultErrorCode};

use crate::interrupts::gdt;
use crate::interrupts::idt::{
    DescriptorType, InterruptDescriptorAttribute, InterruptDescriptorTable,
};
use crate::log;
use crate::logger::LogLevel;

const DIVIDE_ERROR: u8 = 0;
const BREAKPOINT: u8 = 3;
const INVALID_OPCODE: u8 = 6;
const DOUBLE_FAULT: u8 = 8;
const GENERAL_PROTECTION: u8 = 13;
const PAGE_FAULT: u8 = 14;

/// Gates that run on the interrupted stack.
fn same_stack_gates() -> [(u8, u64); 5] {
    [
        (DIVIDE_ERROR, divide_error_handler as usize as u64),
        (BREAKPOINT, breakpoint_handler as usize as u64),
        (INVALID_OPCODE, invalid_opcode_handler as usize as u64),
        (GENERAL_PROTECTION, general_protection_handler as usize as u64),
        (PAGE_FAULT, page_fault_handler as usize as u64),
    ]
}

pub fn install(idt: &mut InterruptDescriptorTable, code_segment: u16) {
    for (vector, handler) in same_stack_gates() {
        idt.install_handler(vector, handler, code_segment, 0);
    }

    // Gate IST fields are 1-based; 0 means "no stack switch".
    let ist = (gdt::DOUBLE_FAULT_IST_INDEX + 1) as u8;
    idt.set_entry(
        DOUBLE_FAULT,
        InterruptDescriptorAttribute::new(DescriptorType::InterruptGate, 0, true, ist),
        double_fault_handler as usize as u64,
        code_segment,
    );
}

fn fatal(name: &str, stack_frame: &InterruptStackFrame) -> ! {
    panic!("EXCEPTION: {}\n{:#?}", name, stack_frame);
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    log!(
        LogLevel::Warn,
        "EXCEPTION: BREAKPOINT at {:#x}",
        stack_frame.instruction_pointer.as_u64()
    );
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    fatal("DIVIDE ERROR", &stack_frame);
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    fatal("INVALID OPCODE", &stack_frame);
}

extern "x86-interrupt" fn general_protection_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    log!(LogLevel::Error, "general protection, selector index {:#x}", error_code);
    fatal("GENERAL PROTECTION", &stack_frame);
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    fatal("DOUBLE FAULT", &stack_frame);
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    log!(
        LogLevel::Error,
        "page fault at {:#x}: {:?}",
        Cr2::read_raw(),
        error_code
    );
    fatal("PAGE FAULT", &stack_frame);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: u16 = 0x08;

    #[test]
    fn exception_gates_installed() {
        let mut idt = InterruptDescriptorTable::new();

        install(&mut idt, SELECTOR);

        for vector in [DIVIDE_ERROR, BREAKPOINT, INVALID_OPCODE, GENERAL_PROTECTION, PAGE_FAULT] {
            let entry = idt.entry(vector);
            assert!(entry.is_present(), "vector {}", vector);
            assert_eq!(entry.attributes().interrupt_stack_table(), 0, "vector {}", vector);
            assert_eq!(entry.segment_selector(), SELECTOR);
            assert_ne!(entry.handler_address(), 0);
        }
    }

    #[test]
    fn double_fault_switches_to_its_own_stack() {
        let mut idt = InterruptDescriptorTable::new();

        install(&mut idt, SELECTOR);

        let entry = idt.entry(DOUBLE_FAULT);
        assert!(entry.is_present());
        assert_eq!(entry.attributes().interrupt_stack_table(), 1);
        assert_eq!(
            entry.attributes().descriptor_type(),
            Some(DescriptorType::InterruptGate)
        );
        assert_eq!(entry.segment_selector(), SELECTOR);
    }

    #[test]
    fn other_vectors_stay_missing() {
        let mut idt = InterruptDescriptorTable::new();

        install(&mut idt, SELECTOR);

        for vector in [1u8, 2, 7, 15, 32, 0x40, 255] {
            assert!(!idt.entry(vector).is_present(), "vector {}", vector);
        }
    }
}
