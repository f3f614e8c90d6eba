//! CPU interrupt flag control.

/// Masking primitives the main loop brackets every queue access with.
pub trait InterruptControl {
    fn disable(&self);
    fn enable(&self);
    /// Re-enables interrupts and halts in one step: an interrupt that became
    /// pending while masked wakes the CPU instead of being slept through.
    fn enable_and_wait(&self);
}

/// `cli` / `sti` / `sti; hlt`. The one-instruction interrupt shadow after
/// `sti` keeps anything pending from being taken before `hlt` starts.
pub struct X86Interrupts;

impl InterruptControl for X86Interrupts {
    fn disable(&self) {
        x86_64::instructions::interrupts::disable();
    }

    fn enable(&self) {
        x86_64::instructions::interrupts::enable();
    }

    fn enable_and_wait(&self) {
        x86_64::instructions::interrupts::enable_and_hlt();
    }
}
