use crate::control::PidBankConfig;
use crate::motor_matrix::MixerConfig;
use crate::orientation::OrientationConfig;
use crate::receiver::{ChannelMap, OutputRange, ReceiverConfig};

/// Flight controller configuration for `N` motors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config<const N: usize> {
    pub receiver: ReceiverConfig,
    pub channels: ChannelMap,
    pub pid: PidBankConfig,
    pub mixer: MixerConfig<N>,
    pub orientation: OrientationConfig,

    /// Arm channel value (in percent) below which the motors are held at minimum.
    pub arm_threshold: i32,

    /// Time (in milliseconds) to hold the arming pulse before the first cycle.
    pub arm_delay_ms: u16,

    /// Frequency (in hz) of the control loop.
    pub loop_rate_hz: u16,
}

impl Config<4> {
    /// Configuration of the reference X quad-copter.
    pub fn quad_x() -> Self {
        Self::new(MixerConfig::quad_x())
    }
}

impl Default for Config<4> {
    fn default() -> Self {
        Self::quad_x()
    }
}

impl<const N: usize> Config<N> {
    /// Create a configuration around `mixer`. The throttle channel spans the mixer's actuator range.
    pub fn new(mixer: MixerConfig<N>) -> Self {
        let mut channels = ChannelMap::default();
        channels.throttle = channels.throttle.with_range(OutputRange::new(
            mixer.range.min as i32,
            mixer.range.max as i32,
        ));

        Self {
            receiver: ReceiverConfig::default(),
            channels,
            pid: PidBankConfig::default(),
            mixer,
            orientation: OrientationConfig::default(),
            arm_threshold: 50,
            arm_delay_ms: 2000,
            loop_rate_hz: 100,
        }
    }

    /// The control loop period in seconds.
    pub fn dt(&self) -> f32 {
        if self.loop_rate_hz == 0 {
            0.
        } else {
            1. / self.loop_rate_hz as f32
        }
    }

    /// The control loop period in microseconds.
    pub fn loop_period_us(&self) -> u32 {
        1_000_000u32
            .checked_div(self.loop_rate_hz as u32)
            .unwrap_or(0)
    }

    pub fn with_receiver(mut self, receiver: ReceiverConfig) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn with_channels(mut self, channels: ChannelMap) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_pid(mut self, pid: PidBankConfig) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_orientation(mut self, orientation: OrientationConfig) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_arm_threshold(mut self, percent: i32) -> Self {
        self.arm_threshold = percent;
        self
    }

    pub fn with_arm_delay(mut self, ms: u16) -> Self {
        self.arm_delay_ms = ms;
        self
    }

    pub fn with_loop_rate(mut self, hz: u16) -> Self {
        self.loop_rate_hz = hz;
        self
    }
}
