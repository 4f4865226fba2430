//! # quad-stabilizer
//! A `#![no_std]` attitude stabilization core for quadrotors.
//!
//! # Interrupt-side components
//! [`ChannelDecoder`](receiver::ChannelDecoder) measures receiver pulse widths from pin-change interrupts.
//!
//! [`DataReady`](orientation::DataReady) is the flag raised by the motion sensor's data-ready interrupt.
//!
//! # Control components
//! [`Receiver`](receiver::Receiver) turns pulse widths into a calibrated [`NormalizedCommand`].
//!
//! [`OrientationAcquirer`](orientation::OrientationAcquirer) pulls one orientation sample per cycle from a [`MotionSensor`].
//!
//! [`PidBank`](control::PidBank) corrects pitch, roll and yaw and [`Mixer`](motor_matrix::Mixer)
//! allocates the corrections to each motor.
//!
//! [`QuadCopter`] runs one control cycle at a time and the [`Scheduler`] runs it at a fixed rate.

#![no_std]

pub mod config;
pub use config::Config;

pub mod control;

pub mod copter;
pub use copter::{Cycle, QuadCopter};

mod error;
pub use error::{micros, Error};

pub mod hal;
pub use hal::{Actuator, MotionSensor, ESC};

pub mod motor_matrix;
pub use motor_matrix::{ActuatorRange, Mixer, MixingRow, MotorCommand};

pub mod orientation;

pub mod receiver;
pub use receiver::NormalizedCommand;

pub mod scheduler;
pub use scheduler::Scheduler;

#[cfg(test)]
mod test_utils;

/// Roll, pitch and yaw angles in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attitude {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Attitude {
    pub const fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}
