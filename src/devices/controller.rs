//! Host controller driver contract.
//!
//! The kernel core never looks inside transfer or event rings; it only
//! sequences these calls and logs their results. Each controller family
//! (xHCI today) supplies its own implementation.

use crate::error::Result;

pub trait RootPort {
    /// 1-based port number.
    fn number(&self) -> u8;
    fn is_connected(&self) -> bool;
}

pub trait HostController {
    type Port: RootPort;

    /// Resets the controller and prepares its data structures.
    fn initialize(&mut self) -> Result<()>;
    /// Starts the schedule and enables interrupt generation.
    fn run(&mut self) -> Result<()>;
    fn max_ports(&self) -> u8;
    /// `number` runs from 1 to `max_ports()`.
    fn port_at(&self, number: u8) -> Self::Port;
    fn configure_port(&mut self, port: &Self::Port) -> Result<()>;

    /// Whether the primary event ring holds an unconsumed completion.
    fn has_pending_completion(&self) -> bool;
    /// Consumes and handles one completion from the primary event ring.
    /// The completion is consumed even when handling it fails.
    fn process_one_completion(&mut self) -> Result<()>;
}
