//! # Main Loop
//!
//! ```text
//! ┌──▶ disable ──▶ front + pop ──Empty──▶ enable_and_wait ──┐
//! │                    │ Ok                                  │
//! │                    ▼                                     │
//! │            enable ──▶ dispatch                           │
//! └───────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Every read of queue state happens between `disable` and `enable`. A push
//! landing after the emptiness check is held pending by the CPU and wakes
//! the `enable_and_wait` that follows, so it is seen on the next pass.

use spin::Mutex;

use crate::data_structures::ArrayQueue;
use crate::devices::HostController;
use crate::interrupts::InterruptControl;
use crate::kernel::message::{Message, MessageKind};
use crate::log;
use crate::logger::LogLevel;

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    Dispatched(MessageKind),
}

pub struct EventLoop<'a, H: HostController, I: InterruptControl, const N: usize> {
    queue: &'a Mutex<ArrayQueue<Message, N>>,
    controller: H,
    cpu: I,
}

impl<'a, H: HostController, I: InterruptControl, const N: usize> EventLoop<'a, H, I, N> {
    pub fn new(queue: &'a Mutex<ArrayQueue<Message, N>>, controller: H, cpu: I) -> Self {
        Self { queue, controller, cpu }
    }

    pub fn controller(&self) -> &H {
        &self.controller
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    pub fn step(&mut self) -> Step {
        self.cpu.disable();

        // `front` is only kept if the pop proves the queue was non-empty.
        let message = {
            let mut queue = self.queue.lock();
            let front = *queue.front();
            queue.pop().ok().map(|()| front)
        };

        let Some(message) = message else {
            self.cpu.enable_and_wait();
            return Step::Idle;
        };

        self.cpu.enable();
        self.dispatch(message);
        Step::Dispatched(message.kind)
    }

    fn dispatch(&mut self, message: Message) {
        match message.kind {
            MessageKind::InterruptXhci => self.drain_completions(),
        }
    }

    fn drain_completions(&mut self) {
        while self.controller.has_pending_completion() {
            if let Err(e) = self.controller.process_one_completion() {
                log!(LogLevel::Error, "Error while processing xHC event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    use crate::devices::testing::{ControllerState, FakeController};
    use crate::error::{Code, Error};
    use crate::interrupts::EndOfInterrupt;
    use crate::kernel::on_device_interrupt;

    type Queue = Mutex<ArrayQueue<Message, 4>>;

    fn queue() -> Queue {
        Mutex::new(ArrayQueue::new(Message::new(MessageKind::InterruptXhci)))
    }

    #[derive(Default)]
    struct CountingEoi(Cell<u32>);

    impl EndOfInterrupt for CountingEoi {
        fn notify_end_of_interrupt(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// CPU with an interrupt flag and one pending-interrupt latch. The
    /// handler runs only while the flag is set, exactly as the hardware
    /// delivers a held interrupt on `sti`.
    struct SimCpu<'a> {
        enabled: Cell<bool>,
        pending: Cell<bool>,
        /// Raise the device interrupt right after the next `disable`.
        raise_after_disable: Cell<bool>,
        /// `enable_and_wait` calls with nothing to wake them.
        slept: Cell<u32>,
        isr: &'a dyn Fn(),
    }

    impl<'a> SimCpu<'a> {
        fn new(isr: &'a dyn Fn()) -> Self {
            Self {
                enabled: Cell::new(false),
                pending: Cell::new(false),
                raise_after_disable: Cell::new(false),
                slept: Cell::new(0),
                isr,
            }
        }

        fn deliver(&self) -> bool {
            if self.enabled.get() && self.pending.replace(false) {
                (self.isr)();
                return true;
            }
            false
        }
    }

    impl InterruptControl for &SimCpu<'_> {
        fn disable(&self) {
            self.enabled.set(false);
            if self.raise_after_disable.replace(false) {
                self.pending.set(true);
            }
        }

        fn enable(&self) {
            self.enabled.set(true);
            self.deliver();
        }

        fn enable_and_wait(&self) {
            self.enabled.set(true);
            if !self.deliver() {
                self.slept.set(self.slept.get() + 1);
            }
        }
    }

    #[test]
    fn interrupt_between_check_and_wait_is_not_lost() {
        let queue = queue();
        let state = ControllerState::default();
        let eoi = CountingEoi::default();
        let isr = || {
            state.post_completion();
            on_device_interrupt(&queue, MessageKind::InterruptXhci, &eoi);
        };
        let cpu = SimCpu::new(&isr);
        let mut event_loop = EventLoop::new(&queue, FakeController { state: &state }, &cpu);

        cpu.raise_after_disable.set(true);
        assert_eq!(event_loop.step(), Step::Idle);
        assert_eq!(cpu.slept.get(), 0);
        assert_eq!(queue.lock().count(), 1);

        assert_eq!(event_loop.step(), Step::Dispatched(MessageKind::InterruptXhci));
        assert_eq!(state.processed.get(), 1);
        assert_eq!(queue.lock().count(), 0);

        assert_eq!(event_loop.step(), Step::Idle);
        assert_eq!(cpu.slept.get(), 1);
        assert_eq!(state.processed.get(), 1);
        assert_eq!(eoi.0.get(), 1);
    }

    #[test]
    fn one_message_drains_every_pending_completion() {
        let queue = queue();
        let state = ControllerState::default();
        let isr = || {};
        let cpu = SimCpu::new(&isr);
        for _ in 0..3 {
            state.post_completion();
        }
        queue.lock().push(Message::new(MessageKind::InterruptXhci)).unwrap();
        let mut event_loop = EventLoop::new(&queue, FakeController { state: &state }, &cpu);

        assert_eq!(event_loop.step(), Step::Dispatched(MessageKind::InterruptXhci));

        assert_eq!(state.processed.get(), 3);
        assert!(!event_loop.controller().has_pending_completion());
    }

    #[test]
    fn driver_error_does_not_stop_the_loop() {
        let queue = queue();
        let state = ControllerState::default();
        state
            .outcomes
            .borrow_mut()
            .push_back(Err(Error::new(Code::HardwareInitFailure)));
        let isr = || {};
        let cpu = SimCpu::new(&isr);
        state.post_completion();
        state.post_completion();
        {
            let mut queue = queue.lock();
            queue.push(Message::new(MessageKind::InterruptXhci)).unwrap();
            queue.push(Message::new(MessageKind::InterruptXhci)).unwrap();
        }
        let mut event_loop = EventLoop::new(&queue, FakeController { state: &state }, &cpu);

        assert_eq!(event_loop.step(), Step::Dispatched(MessageKind::InterruptXhci));
        assert_eq!(state.processed.get(), 2);

        state.post_completion();
        assert_eq!(event_loop.step(), Step::Dispatched(MessageKind::InterruptXhci));
        assert_eq!(state.processed.get(), 3);
        assert_eq!(event_loop.step(), Step::Idle);
    }

    #[test]
    fn empty_queue_goes_idle_without_dispatch() {
        let queue = queue();
        let state = ControllerState::default();
        state.post_completion();
        let isr = || {};
        let cpu = SimCpu::new(&isr);
        let mut event_loop = EventLoop::new(&queue, FakeController { state: &state }, &cpu);

        assert_eq!(event_loop.step(), Step::Idle);

        assert_eq!(queue.lock().count(), 0);
        assert_eq!(cpu.slept.get(), 1);
        assert_eq!(state.processed.get(), 0);
    }

    #[test]
    fn interrupts_are_enabled_after_every_step() {
        let queue = queue();
        let state = ControllerState::default();
        let isr = || {};
        let cpu = SimCpu::new(&isr);
        let mut event_loop = EventLoop::new(&queue, FakeController { state: &state }, &cpu);

        event_loop.step();
        assert!(cpu.enabled.get());

        queue.lock().push(Message::new(MessageKind::InterruptXhci)).unwrap();
        event_loop.step();
        assert!(cpu.enabled.get());
    }
}
