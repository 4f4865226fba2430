mod builder;

pub use builder::Builder;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::PwmPin;
use num_traits::{NumCast, ToPrimitive};

use crate::hal::Actuator;
use crate::motor_matrix::ActuatorRange;

use super::ESC;

/// An ESC implementation for RC (servo pulse) motor controllers.
pub struct RCESC<T: PwmPin> {
    /// Pulse width sent when arming, in microseconds.
    arm: u16,
    range: ActuatorRange,
    /// PWM period in microseconds.
    period: u32,
    /// Time to hold the arming pulse, in milliseconds.
    arm_delay_ms: u16,
    pin: T,
}

impl<T> RCESC<T>
where
    T: PwmPin,
    T::Duty: NumCast + ToPrimitive,
{
    pub fn new(arm: u16, range: ActuatorRange, period: u32, pin: T) -> Self {
        Self {
            arm,
            range,
            period,
            arm_delay_ms: 2000,
            pin,
        }
    }

    pub fn range(&self) -> ActuatorRange {
        self.range
    }

    pub fn pin(&self) -> &T {
        &self.pin
    }

    /// Arm this ESC and hold the arming pulse until the ESC has registered it.
    pub fn arm_blocking<D>(&mut self, delay: &mut D)
    where
        D: DelayMs<u16>,
    {
        self.arm_inner();
        delay.delay_ms(self.arm_delay_ms);
    }

    fn arm_inner(&mut self) {
        log::debug!("arming ESC at {} us", self.arm);
        self.set_pulse_width(self.arm)
    }

    /// Convert a pulse width (in microseconds) into a duty of the PWM period.
    pub fn duty(&self, pulse_width: u16) -> Option<T::Duty> {
        if self.period == 0 {
            return None;
        }
        let max_duty = self.pin.get_max_duty().to_u64()?;
        let duty = pulse_width as u64 * max_duty / self.period as u64;
        <T::Duty as NumCast>::from(duty.min(max_duty))
    }

    fn set_pulse_width(&mut self, pulse_width: u16) {
        if let Some(duty) = self.duty(pulse_width) {
            self.pin.set_duty(duty);
        }
    }
}

impl<T> Actuator for RCESC<T>
where
    T: PwmPin,
    T::Duty: NumCast + ToPrimitive,
{
    fn output(&mut self, pulse_width: u16) {
        let pulse_width = self.range.clamp(pulse_width as f32).pulse_width();
        self.set_pulse_width(pulse_width);
    }
}

impl<T> ESC for RCESC<T>
where
    T: PwmPin,
    T::Duty: NumCast + ToPrimitive,
{
    fn arm(&mut self) {
        self.arm_inner()
    }
}
