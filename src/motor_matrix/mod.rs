//! Static motor mixing.
//!
//! Allocate pitch, roll, yaw and throttle demand to `N` motors and clamp the
//! result into the actuator range.
//! ```
//! use quad_stabilizer::motor_matrix::{Demand, Mixer, MixerConfig};
//!
//! let mixer = Mixer::new(MixerConfig::quad_x());
//! let outputs = mixer.mix(Demand::throttle(1500.));
//!
//! assert!(outputs.iter().all(|output| output.pulse_width() == 1500));
//! ```

use nalgebra::{SMatrix, SVector, Vector4};
use num_traits::Float;

/// The contribution of each control axis to one motor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MixingRow {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub throttle: f32,
}

impl MixingRow {
    pub const fn new(pitch: f32, roll: f32, yaw: f32, throttle: f32) -> Self {
        Self {
            pitch,
            roll,
            yaw,
            throttle,
        }
    }

    fn coefficient(&self, axis: usize) -> f32 {
        match axis {
            0 => self.pitch,
            1 => self.roll,
            2 => self.yaw,
            _ => self.throttle,
        }
    }
}

/// A clamped actuator pulse width in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MotorCommand(u16);

impl MotorCommand {
    pub fn pulse_width(self) -> u16 {
        self.0
    }
}

/// Inclusive range of actuator pulse widths (in microseconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActuatorRange {
    pub min: u16,
    pub max: u16,
}

impl Default for ActuatorRange {
    fn default() -> Self {
        Self {
            min: 1100,
            max: 1900,
        }
    }
}

impl ActuatorRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// The lowest command, sent to idle (or disarmed) motors.
    pub fn min_command(&self) -> MotorCommand {
        MotorCommand(self.min)
    }

    /// Round and clamp a raw output into this range.
    /// `NaN` clamps to the minimum.
    pub fn clamp(&self, raw: f32) -> MotorCommand {
        if raw.is_nan() {
            return self.min_command();
        }
        let clamped = Float::round(raw).max(self.min as f32).min(self.max as f32);
        MotorCommand(clamped as u16)
    }
}

/// Per-axis demand to allocate to the motors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Demand {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub throttle: f32,
}

impl Demand {
    pub const fn new(pitch: f32, roll: f32, yaw: f32, throttle: f32) -> Self {
        Self {
            pitch,
            roll,
            yaw,
            throttle,
        }
    }

    /// Demand with only collective throttle.
    pub const fn throttle(throttle: f32) -> Self {
        Self::new(0., 0., 0., throttle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixerConfig<const N: usize> {
    pub rows: [MixingRow; N],
    pub range: ActuatorRange,
}

impl MixerConfig<4> {
    /// Reference X quad-copter layout.
    ///
    /// Motors in order: front-right (CCW), front-left (CW), rear-right (CW), rear-left (CCW).
    pub fn quad_x() -> Self {
        Self {
            rows: [
                MixingRow::new(1., -1., 1., 1.),
                MixingRow::new(1., 1., -1., 1.),
                MixingRow::new(-1., -1., -1., 1.),
                MixingRow::new(-1., 1., 1., 1.),
            ],
            range: ActuatorRange::default(),
        }
    }
}

impl<const N: usize> MixerConfig<N> {
    pub fn with_range(mut self, range: ActuatorRange) -> Self {
        self.range = range;
        self
    }
}

/// Motor mixer for `N` motors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mixer<const N: usize> {
    /// Allocation matrix with columns pitch, roll, yaw and throttle.
    matrix: SMatrix<f32, N, 4>,
    range: ActuatorRange,
}

impl<const N: usize> Mixer<N> {
    pub fn new(config: MixerConfig<N>) -> Self {
        Self {
            matrix: SMatrix::from_fn(|motor, axis| config.rows[motor].coefficient(axis)),
            range: config.range,
        }
    }

    pub fn matrix(&self) -> &SMatrix<f32, N, 4> {
        &self.matrix
    }

    pub fn range(&self) -> ActuatorRange {
        self.range
    }

    /// Calculate the raw (unclamped) output of each motor.
    pub fn allocate(&self, demand: Demand) -> SVector<f32, N> {
        let input = Vector4::new(demand.pitch, demand.roll, demand.yaw, demand.throttle);
        self.matrix * input
    }

    /// Calculate the clamped command for each motor.
    pub fn mix(&self, demand: Demand) -> [MotorCommand; N] {
        let raw = self.allocate(demand);
        let mut commands = [self.range.min_command(); N];
        for (command, output) in commands.iter_mut().zip(raw.iter()) {
            *command = self.range.clamp(*output);
        }
        commands
    }

    /// Every motor at the minimum command.
    pub fn idle(&self) -> [MotorCommand; N] {
        [self.range.min_command(); N]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pure_throttle_is_equal() {
        let mixer = Mixer::new(MixerConfig::quad_x());
        let outputs = mixer.mix(Demand::throttle(1400.));
        assert_eq!(outputs, [MotorCommand(1400); 4]);
    }

    #[test]
    fn pure_yaw_spins_pairs_opposite() {
        let mixer = Mixer::new(MixerConfig::quad_x());
        let raw = mixer.allocate(Demand::new(0., 0., 50., 0.));

        assert_relative_eq!(raw[0], 50.);
        assert_relative_eq!(raw[1], -50.);
        assert_relative_eq!(raw[2], -50.);
        assert_relative_eq!(raw[3], 50.);
        assert_relative_eq!(raw.sum(), 0.);
    }

    #[test]
    fn pitch_splits_front_and_rear() {
        let mixer = Mixer::new(MixerConfig::quad_x());
        let outputs = mixer.mix(Demand::new(100., 0., 0., 1500.));
        let widths = outputs.map(MotorCommand::pulse_width);
        assert_eq!(widths, [1600, 1600, 1400, 1400]);
    }

    #[test]
    fn outputs_are_clamped() {
        let mixer = Mixer::new(MixerConfig::quad_x());
        let outputs = mixer.mix(Demand::new(0., 500., 0., 1800.));
        let widths = outputs.map(MotorCommand::pulse_width);
        assert_eq!(widths, [1300, 1900, 1300, 1900]);

        let range = ActuatorRange::default();
        assert_eq!(range.clamp(f32::NAN), MotorCommand(1100));
        assert_eq!(range.clamp(f32::INFINITY), MotorCommand(1900));
        assert_eq!(range.clamp(f32::NEG_INFINITY), MotorCommand(1100));
        assert_eq!(range.clamp(1500.4), MotorCommand(1500));
    }

    #[test]
    fn custom_rows() {
        let mixer = Mixer::new(MixerConfig {
            rows: [MixingRow::new(0., 0., 0., 1.), MixingRow::new(0.5, 0., 0., 1.)],
            range: ActuatorRange::new(1000, 2000),
        });
        let widths = mixer
            .mix(Demand::new(200., 0., 0., 1000.))
            .map(MotorCommand::pulse_width);
        assert_eq!(widths, [1000, 1100]);
        assert_eq!(mixer.idle(), [MotorCommand(1000); 2]);
    }
}
