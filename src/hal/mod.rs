use crate::Attitude;

pub mod esc;
pub use esc::{ESC, RCESC};

pub trait Actuator {
    /// Output a pulse width in microseconds.
    fn output(&mut self, pulse_width: u16);
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    fn output(&mut self, pulse_width: u16) {
        (**self).output(pulse_width)
    }
}

/// A motion sensor that buffers fused orientation packets in a FIFO
/// and raises an interrupt when a packet is ready.
pub trait MotionSensor {
    type Error;

    /// Configure the device and its motion processor.
    /// Returns the size in bytes of one orientation packet.
    fn initialize(&mut self) -> Result<u16, Self::Error>;

    /// Read (and clear) the interrupt status byte.
    fn interrupt_status(&mut self) -> Result<u8, Self::Error>;

    /// Number of bytes currently in the FIFO.
    fn fifo_count(&mut self) -> Result<u16, Self::Error>;

    fn reset_fifo(&mut self) -> Result<(), Self::Error>;

    /// Read exactly `buffer.len()` bytes from the FIFO.
    fn read_fifo(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Decode one orientation packet into yaw, pitch and roll in radians.
    fn decode(&self, packet: &[u8]) -> Attitude;
}
