use core::f32::consts::PI;
use num_traits::Float;
use pid_controller::error;

use crate::Attitude;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Gains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidConfig {
    pub gains: Gains,
    /// Lowest output.
    pub lower: f32,
    /// Highest output.
    pub upper: f32,
    /// Errors at or below this magnitude don't integrate.
    pub epsilon: f32,
    /// Wrap the error into (-PI, PI] for angles that wrap around (yaw).
    pub wrap_angle: bool,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            gains: Gains::new(150., 10., 0.),
            lower: -200.,
            upper: 200.,
            epsilon: 0.01,
            wrap_angle: false,
        }
    }
}

impl PidConfig {
    pub fn with_gains(mut self, gains: Gains) -> Self {
        self.gains = gains;
        self
    }

    /// Builder method to set symmetric output bounds of `-limit..=limit`.
    pub fn with_limit(mut self, limit: f32) -> Self {
        self.lower = -limit;
        self.upper = limit;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_wrap_angle(mut self, wrap_angle: bool) -> Self {
        self.wrap_angle = wrap_angle;
        self
    }
}

/// Wrap an angle in radians into (-PI, PI].
pub fn wrap_pi(angle: f32) -> f32 {
    let two_pi = 2. * PI;
    let shifted = angle + PI;
    let wrapped = shifted - two_pi * Float::floor(shifted / two_pi) - PI;

    if wrapped <= -PI {
        wrapped + two_pi
    } else {
        wrapped
    }
}

/// Bounded PID controller with integral anti-windup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pid {
    pub config: PidConfig,
    integral: f32,
    previous_error: f32,
}

impl Pid {
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            integral: 0.,
            previous_error: 0.,
        }
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn previous_error(&self) -> f32 {
        self.previous_error
    }

    pub fn reset(&mut self) {
        self.integral = 0.;
        self.previous_error = 0.;
    }

    /// Calculate the bounded control output for the commanded and measured value over a timestep of `dt` seconds.
    pub fn update(&mut self, command: f32, measured: f32, dt: f32) -> f32 {
        let PidConfig {
            gains,
            lower,
            upper,
            epsilon,
            wrap_angle,
        } = self.config;

        let mut error = error(command, measured);
        if wrap_angle {
            error = wrap_pi(error);
        }

        // Freeze the integral once the error is negligible
        let step = if Float::abs(error) > epsilon {
            dt * error
        } else {
            0.
        };
        self.integral += step;

        let derivative = if dt > 0. {
            (error - self.previous_error) / dt
        } else {
            0.
        };

        let mut output = gains.kp * error + gains.ki * self.integral - gains.kd * derivative;

        if output > upper {
            output = upper;
            if gains.ki * error > 0. {
                self.integral -= step;
            }
        } else if output < lower {
            output = lower;
            if gains.ki * error < 0. {
                self.integral -= step;
            }
        }

        self.previous_error = error;

        output
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new(PidConfig::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidBankConfig {
    pub pitch: PidConfig,
    pub roll: PidConfig,
    pub yaw: PidConfig,
}

impl Default for PidBankConfig {
    fn default() -> Self {
        let attitude = PidConfig::default();
        Self {
            pitch: attitude,
            roll: attitude,
            yaw: PidConfig::default()
                .with_gains(Gains::new(100., 5., 0.))
                .with_limit(100.)
                .with_wrap_angle(true),
        }
    }
}

/// Independent pitch, roll and yaw controllers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidBank {
    pub pitch: Pid,
    pub roll: Pid,
    pub yaw: Pid,
}

impl PidBank {
    pub fn new(config: PidBankConfig) -> Self {
        Self {
            pitch: Pid::new(config.pitch),
            roll: Pid::new(config.roll),
            yaw: Pid::new(config.yaw),
        }
    }

    /// Calculate the control demand for each axis from the commanded and measured attitude (in radians).
    pub fn update(&mut self, command: Attitude, measured: Attitude, dt: f32) -> Attitude {
        Attitude {
            yaw: self.yaw.update(command.yaw, measured.yaw, dt),
            pitch: self.pitch.update(command.pitch, measured.pitch, dt),
            roll: self.roll.update(command.roll, measured.roll, dt),
        }
    }

    pub fn reset(&mut self) {
        self.pitch.reset();
        self.roll.reset();
        self.yaw.reset();
    }
}

impl Default for PidBank {
    fn default() -> Self {
        Self::new(PidBankConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 0.01;

    fn proportional(kp: f32) -> PidConfig {
        PidConfig::default()
            .with_gains(Gains::new(kp, 0., 0.))
            .with_limit(1000.)
    }

    #[test]
    fn it_wraps_angles() {
        assert_relative_eq!(wrap_pi(0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(wrap_pi(PI), PI);
        assert_relative_eq!(wrap_pi(-PI), PI);
        assert_relative_eq!(wrap_pi(3. * PI / 2.), -PI / 2., epsilon = 1e-5);
        assert_relative_eq!(wrap_pi(-3. * PI / 2.), PI / 2., epsilon = 1e-5);
    }

    #[test]
    fn proportional_output() {
        let mut pid = Pid::new(proportional(2.));
        assert_relative_eq!(pid.update(1., 0.25, DT), 1.5);
        assert_relative_eq!(pid.previous_error(), 0.75);
    }

    #[test]
    fn integral_freezes_near_zero_error() {
        let mut pid = Pid::new(PidConfig::default().with_gains(Gains::new(1., 1., 0.)));

        pid.update(1., 0., DT);
        assert_relative_eq!(pid.integral(), 0.01);

        // Converged to within epsilon
        for _ in 0..10 {
            pid.update(1., 0.995, DT);
        }
        assert_relative_eq!(pid.integral(), 0.01);
    }

    #[test]
    fn yaw_takes_the_short_way_around() {
        let mut pid = Pid::new(proportional(1.).with_wrap_angle(true));
        let output = pid.update(170f32.to_radians(), (-170f32).to_radians(), DT);

        assert!(Float::abs(output) <= 20f32.to_radians() + 1e-5);
        assert_relative_eq!(output, (-20f32).to_radians(), epsilon = 1e-5);
    }

    #[test]
    fn unwrapped_axes_do_not_wrap() {
        let mut pid = Pid::new(proportional(1.));
        let output = pid.update(170f32.to_radians(), (-170f32).to_radians(), DT);
        assert_relative_eq!(output, 340f32.to_radians(), epsilon = 1e-5);
    }

    #[test]
    fn anti_windup_pins_output() {
        let mut pid = Pid::new(
            PidConfig::default()
                .with_gains(Gains::new(1., 10., 0.))
                .with_limit(0.5),
        );

        for _ in 0..1000 {
            assert_relative_eq!(pid.update(1., 0., DT), 0.5);
        }
        // The integral never winds up past the bound
        assert!(pid.integral() <= 0.01 + 1e-6);

        for _ in 0..1000 {
            assert_relative_eq!(pid.update(-1., 0., DT), -0.5);
        }
        assert!(Float::abs(pid.integral()) <= 0.01 + 1e-6);
    }

    #[test]
    fn integral_grows_until_output_saturates() {
        let mut pid = Pid::new(
            PidConfig::default()
                .with_gains(Gains::new(0.1, 1., 0.))
                .with_limit(0.5),
        );

        for _ in 0..10 {
            pid.update(1., 0., DT);
        }
        assert_relative_eq!(pid.integral(), 0.1, epsilon = 1e-5);

        for _ in 0..1000 {
            pid.update(1., 0., DT);
        }
        // 0.1 from the P term leaves room for about 0.4 of integral
        let plateau = pid.integral();
        assert!(plateau > 0.385 && plateau <= 0.4 + 1e-4);

        for _ in 0..100 {
            assert_relative_eq!(pid.update(1., 0., DT), 0.5, epsilon = 1e-5);
            assert_relative_eq!(pid.integral(), plateau, epsilon = 1e-4);
        }
    }

    #[test]
    fn derivative_opposes_change() {
        let mut pid = Pid::new(
            PidConfig::default()
                .with_gains(Gains::new(0., 0., 0.01))
                .with_limit(1000.),
        );
        pid.update(0., 0., DT);
        // Error jumps from 0 to 1 in one step
        assert_relative_eq!(pid.update(1., 0., DT), -1., epsilon = 1e-5);
        assert_relative_eq!(pid.update(1., 0., 0.), 0.);
    }

    #[test]
    fn reset_clears_state() {
        let mut pid = Pid::default();
        pid.update(1., 0., DT);
        pid.reset();
        assert_eq!(pid.integral(), 0.);
        assert_eq!(pid.previous_error(), 0.);
    }

    #[test]
    fn bank_axes_are_independent() {
        let mut bank = PidBank::default();
        let command = Attitude::new(0., 0.1, 0.);
        let output = bank.update(command, Attitude::default(), DT);

        assert!(output.pitch > 0.);
        assert_eq!(output.roll, 0.);
        assert_eq!(output.yaw, 0.);
        assert_eq!(bank.roll.integral(), 0.);
        assert_eq!(bank.yaw.integral(), 0.);
    }
}
