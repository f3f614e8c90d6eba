//! # Kernel Core
//!
//! Start-up sequencing and the interrupt-to-main-loop handoff.
//!
//! ```text
//!  xHC ──MSI──▶ xhci_interrupt_handler ──push──▶ MAIN_QUEUE ──pop──▶ EventLoop ──▶ xHC event ring
//!                        │
//!                        └──▶ local APIC EOI
//! ```
//!
//! The handler only pushes and acknowledges. Everything that touches the
//! controller runs in the main loop with interrupts enabled.

pub mod event_loop;
pub mod init;
pub mod message;

use spin::{Mutex, Once};
use x86_64::structures::idt::InterruptStackFrame;

use crate::config::MAIN_QUEUE_CAPACITY;
use crate::data_structures::ArrayQueue;
use crate::error::{Code, Error};
use crate::interrupts::{EndOfInterrupt, LocalApic};
use crate::log;
use crate::logger::LogLevel;

pub use event_loop::{EventLoop, Step};
pub use init::start;
pub use message::{Message, MessageKind};

/// Locked by the main loop only with interrupts disabled, so a handler never
/// finds it held.
pub static MAIN_QUEUE: Mutex<ArrayQueue<Message, MAIN_QUEUE_CAPACITY>> =
    Mutex::new(ArrayQueue::new(Message::new(MessageKind::InterruptXhci)));

/// Set before any device vector is installed.
pub static LOCAL_APIC: Once<LocalApic> = Once::new();

/// Handler body: record `kind` and acknowledge. Never blocks; a full queue
/// drops the message.
pub fn on_device_interrupt<const N: usize>(
    queue: &Mutex<ArrayQueue<Message, N>>,
    kind: MessageKind,
    eoi: &dyn EndOfInterrupt,
) {
    let pushed = match queue.try_lock() {
        Some(mut queue) => queue.push(Message::new(kind)),
        None => Err(Error::new(Code::Full)),
    };
    if let Err(e) = pushed {
        log!(LogLevel::Warn, "dropping {:?}: {}", kind, e);
    }
    eoi.notify_end_of_interrupt();
}

pub extern "x86-interrupt" fn xhci_interrupt_handler(_stack_frame: InterruptStackFrame) {
    if let Some(apic) = LOCAL_APIC.get() {
        on_device_interrupt(&MAIN_QUEUE, MessageKind::InterruptXhci, apic);
    }
}

/// Parks the CPU for good with interrupts masked.
pub fn halt() -> ! {
    x86_64::instructions::interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}
