use embedded_hal::PwmPin;
use num_traits::{NumCast, ToPrimitive};

use super::RCESC;
use crate::motor_matrix::ActuatorRange;

pub struct Builder {
    arm: Option<u16>,
    range: ActuatorRange,
    period: u32,
    delay_ms: u16,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            arm: None,
            range: ActuatorRange::default(),
            period: 20_000,
            delay_ms: 2000,
        }
    }
}

impl Builder {
    /// Arming pulse width in microseconds (defaults to 100us above the minimum).
    pub fn arm(mut self, arm: u16) -> Self {
        self.arm = Some(arm);
        self
    }

    pub fn min(mut self, min: u16) -> Self {
        self.range.min = min;
        self
    }

    pub fn max(mut self, max: u16) -> Self {
        self.range.max = max;
        self
    }

    pub fn range(mut self, range: ActuatorRange) -> Self {
        self.range = range;
        self
    }

    /// PWM period in microseconds.
    pub fn period(mut self, micros: u32) -> Self {
        self.period = micros;
        self
    }

    pub fn delay(mut self, ms: u16) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn build<P>(self, pin: P) -> RCESC<P>
    where
        P: PwmPin,
        P::Duty: NumCast + ToPrimitive,
    {
        RCESC {
            arm: self
                .arm
                .unwrap_or(self.range.min.saturating_add(100).min(self.range.max)),
            range: self.range,
            period: self.period,
            arm_delay_ms: self.delay_ms,
            pin,
        }
    }
}
