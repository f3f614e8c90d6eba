//! Scripted host controller for host tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use super::controller::{HostController, RootPort};
use crate::error::{Code, Error, Result};

/// State shared between a [`FakeController`] and the test (or a simulated
/// interrupt handler) driving it.
#[derive(Default)]
pub struct ControllerState {
    pub pending: Cell<u32>,
    pub processed: Cell<u32>,
    /// Results for upcoming completions, `Ok` once exhausted.
    pub outcomes: RefCell<VecDeque<Result<()>>>,
    pub connected: Vec<bool>,
    pub failing_ports: Vec<u8>,
    pub configured: RefCell<Vec<u8>>,
    pub fail_initialize: bool,
    pub calls: RefCell<Vec<&'static str>>,
}

impl ControllerState {
    pub fn with_ports(connected: &[bool]) -> Self {
        Self {
            connected: connected.to_vec(),
            ..Self::default()
        }
    }

    /// What the hardware does when it posts an event.
    pub fn post_completion(&self) {
        self.pending.set(self.pending.get() + 1);
    }
}

pub struct FakePort {
    number: u8,
    connected: bool,
}

impl RootPort for FakePort {
    fn number(&self) -> u8 {
        self.number
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

pub struct FakeController<'a> {
    pub state: &'a ControllerState,
}

impl HostController for FakeController<'_> {
    type Port = FakePort;

    fn initialize(&mut self) -> Result<()> {
        self.state.calls.borrow_mut().push("initialize");
        if self.state.fail_initialize {
            return Err(Error::new(Code::HardwareInitFailure));
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.state.calls.borrow_mut().push("run");
        Ok(())
    }

    fn max_ports(&self) -> u8 {
        self.state.connected.len() as u8
    }

    fn port_at(&self, number: u8) -> FakePort {
        FakePort {
            number,
            connected: self.state.connected[number as usize - 1],
        }
    }

    fn configure_port(&mut self, port: &FakePort) -> Result<()> {
        if self.state.failing_ports.contains(&port.number) {
            return Err(Error::new(Code::HardwareInitFailure));
        }
        self.state.configured.borrow_mut().push(port.number);
        Ok(())
    }

    fn has_pending_completion(&self) -> bool {
        self.state.pending.get() > 0
    }

    fn process_one_completion(&mut self) -> Result<()> {
        self.state.pending.set(self.state.pending.get() - 1);
        self.state.processed.set(self.state.processed.get() + 1);
        self.state.outcomes.borrow_mut().pop_front().unwrap_or(Ok(()))
    }
}
