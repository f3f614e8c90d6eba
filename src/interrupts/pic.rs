//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Device interrupts arrive as MSI through the local APIC, so the legacy
//! pair is only remapped out of the exception range and then fully masked.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │────▶│  (Slave)    │
//! │ vectors 32+ │     │ vectors 40+ │
//! └─────────────┘     └─────────────┘
//!        all lines masked
//! ```
//!
//! A spurious IRQ that slips through before masking lands on 32-47, which
//! no device vector uses.

use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = 40;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

pub fn disable_legacy() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        pics.disable();
    }
}
