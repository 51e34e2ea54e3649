//! The board-level hardware the drivers are written against.
//!
//! Register-level access (I2C controller setup, GPIO direction registers) is
//! left to the board support code; drivers only see these traits.
use crate::port::Port;

/// A bus driver that must be configured once before its first transfer.
pub trait BusInit {
    fn init(&mut self) -> anyhow::Result<()>;
}

/// The per-port GPIO lines wired to each expansion port.
pub trait InputPins: Send + Sync {
    /// Configures the interrupt line of `port` as an input.
    fn set_input(&self, port: Port) -> anyhow::Result<()>;
}
