use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use embedded_hal::digital::v2::{InputPin, PinState};

/// Outcome of an edge interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// The edge timestamp (and a duration, unless the timer wrapped) was stored.
    Recorded,
    /// The consumer was copying this input, or the input does not exist.
    Dropped,
}

/// High and low durations of the last complete pulse period, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PulseWidths {
    pub high: u32,
    pub low: u32,
}

impl PulseWidths {
    pub fn period(&self) -> u64 {
        self.high as u64 + self.low as u64
    }
}

/// Edge timing for one physical input.
///
/// Written only from that input's interrupt handler. The control loop sets
/// `busy` while it copies the durations and the handler drops edges that
/// arrive in the meantime, so a copy never mixes two periods.
pub struct PwmEdgeState {
    last_edge: AtomicU32,
    high: AtomicU32,
    low: AtomicU32,
    busy: AtomicBool,
}

impl PwmEdgeState {
    pub const IDLE: PwmEdgeState = PwmEdgeState::new();

    pub const fn new() -> Self {
        Self {
            last_edge: AtomicU32::new(0),
            high: AtomicU32::new(0),
            low: AtomicU32::new(0),
            busy: AtomicBool::new(false),
        }
    }

    /// Record a logic level change at `now` (in microseconds).
    pub fn on_edge(&self, level: PinState, now: u32) -> Edge {
        if self.busy.load(Ordering::Acquire) {
            return Edge::Dropped;
        }

        let last = self.last_edge.load(Ordering::Relaxed);

        // Skip the duration when the timer wrapped since the last edge
        if now > last {
            let elapsed = now - last;
            match level {
                // Rising edge ends a low period
                PinState::High => self.low.store(elapsed, Ordering::Relaxed),
                PinState::Low => self.high.store(elapsed, Ordering::Relaxed),
            }
        }

        self.last_edge.store(now, Ordering::Release);
        Edge::Recorded
    }

    /// Copy the last measured durations.
    pub fn snapshot(&self) -> PulseWidths {
        self.busy.store(true, Ordering::SeqCst);
        let widths = PulseWidths {
            high: self.high.load(Ordering::Acquire),
            low: self.low.load(Ordering::Acquire),
        };
        self.busy.store(false, Ordering::SeqCst);
        widths
    }

    /// Timestamp of the last edge in microseconds.
    pub fn last_edge(&self) -> u32 {
        self.last_edge.load(Ordering::Acquire)
    }
}

impl Default for PwmEdgeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulse-width decoder for `P` receiver inputs.
///
/// ```
/// use quad_stabilizer::receiver::ChannelDecoder;
/// use embedded_hal::digital::v2::PinState;
///
/// static DECODER: ChannelDecoder<5> = ChannelDecoder::new();
///
/// // From the pin-change interrupt of input 0
/// DECODER.on_edge(0, PinState::High, 1_000);
/// DECODER.on_edge(0, PinState::Low, 2_500);
/// assert_eq!(DECODER.snapshot(0).unwrap().high, 1_500);
/// ```
pub struct ChannelDecoder<const P: usize> {
    inputs: [PwmEdgeState; P],
}

impl<const P: usize> ChannelDecoder<P> {
    pub const fn new() -> Self {
        Self {
            inputs: [PwmEdgeState::IDLE; P],
        }
    }

    /// Interrupt entry point for `input` with the new `level` at `now` (in microseconds).
    pub fn on_edge(&self, input: usize, level: PinState, now: u32) -> Edge {
        match self.inputs.get(input) {
            Some(state) => state.on_edge(level, now),
            None => Edge::Dropped,
        }
    }

    /// Interrupt entry point that reads the new level from `pin`.
    pub fn on_pin_change<I: InputPin>(&self, input: usize, pin: &I, now: u32) -> Edge {
        match pin.is_high() {
            Ok(true) => self.on_edge(input, PinState::High, now),
            Ok(false) => self.on_edge(input, PinState::Low, now),
            Err(_) => Edge::Dropped,
        }
    }

    pub fn snapshot(&self, input: usize) -> Option<PulseWidths> {
        self.inputs.get(input).map(PwmEdgeState::snapshot)
    }

    pub fn last_edge(&self, input: usize) -> Option<u32> {
        self.inputs.get(input).map(PwmEdgeState::last_edge)
    }

    pub const fn len(&self) -> usize {
        P
    }

    pub const fn is_empty(&self) -> bool {
        P == 0
    }
}

impl<const P: usize> Default for ChannelDecoder<P> {
    fn default() -> Self {
        Self::new()
    }
}
