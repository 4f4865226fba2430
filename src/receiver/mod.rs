//! Pilot receiver decoding.
//!
//! Pulse widths are measured per input by [`ChannelDecoder`] from interrupt
//! context, then converted into a [`NormalizedCommand`] once per control cycle
//! by [`Receiver`].

mod decoder;
pub use decoder::{ChannelDecoder, Edge, PulseWidths, PwmEdgeState};

/// Inclusive range of a channel output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputRange {
    pub min: i32,
    pub max: i32,
}

impl OutputRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.max(self.min).min(self.max)
    }

    pub fn midpoint(&self) -> i32 {
        self.min + (self.max - self.min) / 2
    }
}

/// A logical receiver channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    input: usize,
    error: i32,
    range: OutputRange,
    reversed: bool,
}

impl Channel {
    /// Create a channel reading decoder `input` with a calibration `error`
    /// (in the 0 ~ 100 input scale) mapped onto `range`.
    pub const fn new(input: usize, error: i32, range: OutputRange) -> Self {
        Self {
            input,
            error,
            range,
            reversed: false,
        }
    }

    pub const fn with_range(mut self, range: OutputRange) -> Self {
        self.range = range;
        self
    }

    /// Builder method to map the input scale from `range.max` down to `range.min`.
    pub const fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn input(&self) -> usize {
        self.input
    }

    pub fn error(&self) -> i32 {
        self.error
    }

    pub fn range(&self) -> OutputRange {
        self.range
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Map a corrected duty cycle from `[in_min, in_max]` onto the output range and clamp it.
    pub fn map(&self, corrected: i32, in_min: i32, in_max: i32) -> i32 {
        let (out_min, out_max) = if self.reversed {
            (self.range.max, self.range.min)
        } else {
            (self.range.min, self.range.max)
        };

        let span = in_max - in_min;
        let value = if span == 0 {
            out_min
        } else {
            let scaled =
                (corrected as i64 - in_min as i64) * (out_max as i64 - out_min as i64) / span as i64;
            (scaled + out_min as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
        };
        self.range.clamp(value)
    }
}

/// Assignment of decoder inputs to the five logical channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMap {
    pub yaw: Channel,
    pub pitch: Channel,
    pub roll: Channel,
    pub throttle: Channel,
    pub arm: Channel,
}

impl ChannelMap {
    /// The command substituted when the receiver signal is lost:
    /// neutral angles, minimum throttle and disarmed.
    pub fn fail_safe(&self) -> NormalizedCommand {
        NormalizedCommand {
            yaw: self.yaw.range.midpoint(),
            pitch: self.pitch.range.midpoint(),
            roll: self.roll.range.midpoint(),
            throttle: self.throttle.range.min,
            arm: self.arm.range.min,
        }
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        let angle = OutputRange::new(-45, 45);
        Self {
            roll: Channel::new(0, 0, angle).reversed(),
            pitch: Channel::new(1, 0, angle).reversed(),
            throttle: Channel::new(2, 0, OutputRange::new(1100, 1900)),
            yaw: Channel::new(3, 0, angle).reversed(),
            arm: Channel::new(4, 0, OutputRange::new(0, 100)),
        }
    }
}

/// Constants used to normalize pulse widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Input whose last edge decides if the receiver is still connected.
    /// Must be wired to an external interrupt capable pin.
    pub reference_input: usize,

    /// Maximum age (in microseconds) of the reference input's last edge.
    pub stale_threshold_us: u32,

    /// Full scale of the duty cycle (1000 is promille).
    pub duty_scale: u32,

    /// Duty cycle subtracted before scaling by `duty_gain`.
    pub duty_center: i32,

    pub duty_gain: i32,

    /// Corrected duty cycle mapped onto the lower bound of a channel.
    pub input_min: i32,

    /// Corrected duty cycle mapped onto the upper bound of a channel.
    pub input_max: i32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            reference_input: 0,
            stale_threshold_us: 60_000,
            duty_scale: 1000,
            duty_center: 50,
            duty_gain: 2,
            input_min: 0,
            input_max: 100,
        }
    }
}

impl ReceiverConfig {
    pub fn with_stale_threshold(mut self, micros: u32) -> Self {
        self.stale_threshold_us = micros;
        self
    }

    pub fn with_reference_input(mut self, input: usize) -> Self {
        self.reference_input = input;
        self
    }
}

/// Pilot command after calibration and clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NormalizedCommand {
    /// Yaw in degrees.
    pub yaw: i32,
    /// Pitch in degrees.
    pub pitch: i32,
    /// Roll in degrees.
    pub roll: i32,
    /// Throttle in actuator microseconds.
    pub throttle: i32,
    /// Arm switch in percent.
    pub arm: i32,
}

/// Result of reading the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reception {
    Live(NormalizedCommand),
    /// No recent edges, the command is the fail-safe command.
    Stale(NormalizedCommand),
}

impl Reception {
    pub fn command(&self) -> NormalizedCommand {
        match self {
            Reception::Live(command) | Reception::Stale(command) => *command,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Reception::Stale(_))
    }
}

/// Duty cycle of a pulse period in units of `1 / scale`.
/// Returns `None` if no period has been measured.
pub fn duty_cycle(widths: PulseWidths, scale: u32) -> Option<u32> {
    let period = widths.period();
    if period == 0 {
        return None;
    }
    Some((widths.high as u64 * scale as u64 / period) as u32)
}

/// Receiver normalizer over a shared [`ChannelDecoder`].
pub struct Receiver<'a, const P: usize> {
    decoder: &'a ChannelDecoder<P>,
    channels: ChannelMap,
    config: ReceiverConfig,
}

impl<'a, const P: usize> Receiver<'a, P> {
    pub fn new(decoder: &'a ChannelDecoder<P>, channels: ChannelMap, config: ReceiverConfig) -> Self {
        Self {
            decoder,
            channels,
            config,
        }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Read the current command at `now` (in microseconds).
    pub fn read(&self, now: u32) -> Reception {
        let mut widths = [PulseWidths::default(); P];
        for (input, width) in widths.iter_mut().enumerate() {
            if let Some(snapshot) = self.decoder.snapshot(input) {
                *width = snapshot;
            }
        }

        // Only the reference input is checked, the others follow the same transmitter frame
        let last_edge = self
            .decoder
            .last_edge(self.config.reference_input)
            .unwrap_or(0);
        // An edge stamped shortly after `now` landed while this read was running
        let age = now.wrapping_sub(last_edge);
        let ahead = last_edge.wrapping_sub(now);
        let threshold = self.config.stale_threshold_us;
        if age > threshold && ahead > threshold {
            log::warn!("receiver values stale ({} us), using fail-safe", age);
            return Reception::Stale(self.channels.fail_safe());
        }

        let fail_safe = self.channels.fail_safe();
        Reception::Live(NormalizedCommand {
            yaw: self.normalize(&self.channels.yaw, &widths, fail_safe.yaw),
            pitch: self.normalize(&self.channels.pitch, &widths, fail_safe.pitch),
            roll: self.normalize(&self.channels.roll, &widths, fail_safe.roll),
            throttle: self.normalize(&self.channels.throttle, &widths, fail_safe.throttle),
            arm: self.normalize(&self.channels.arm, &widths, fail_safe.arm),
        })
    }

    fn normalize(&self, channel: &Channel, widths: &[PulseWidths; P], fail_safe: i32) -> i32 {
        let duty = widths.get(channel.input).and_then(|widths| {
            duty_cycle(*widths, self.config.duty_scale).map(|duty| (duty, widths.period()))
        });

        match duty {
            Some((duty, period)) => {
                log::trace!("input {} duty {} period {} us", channel.input, duty, period);
                let corrected = (duty as i32 - self.config.duty_center) * self.config.duty_gain
                    + channel.error;
                channel.map(corrected, self.config.input_min, self.config.input_max)
            }
            None => {
                log::trace!("input {} has no pulse period yet", channel.input);
                fail_safe
            }
        }
    }
}
