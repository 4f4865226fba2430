//! Interrupt-driven orientation acquisition from a FIFO-buffered motion sensor.
//!
//! The sensor's interrupt handler only calls [`DataReady::signal`]; everything
//! else happens in [`OrientationAcquirer::poll`] from the control loop.
//!
//! ```
//! use quad_stabilizer::orientation::DataReady;
//!
//! static DATA_READY: DataReady = DataReady::new();
//!
//! // In the sensor interrupt handler
//! DATA_READY.signal();
//!
//! assert!(DATA_READY.take());
//! assert!(!DATA_READY.take());
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use crate::hal::MotionSensor;
use crate::Attitude;

/// Size of the packet buffer, the largest supported packet.
pub const BUFFER_SIZE: usize = 64;

/// Data-ready flag set from interrupt context.
pub struct DataReady(AtomicBool);

impl DataReady {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Mark new sensor data as available.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Read and clear the flag.
    pub fn take(&self) -> bool {
        let is_set = self.0.load(Ordering::Acquire);
        if is_set {
            self.0.store(false, Ordering::Release);
        }
        is_set
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for DataReady {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrientationConfig {
    /// Interrupt status bit set when the FIFO overflowed.
    pub overflow_mask: u8,
    /// Interrupt status bit set when a packet is ready.
    pub data_ready_mask: u8,
    /// FIFO byte count treated as an overflow.
    pub overflow_threshold: u16,
    /// Maximum FIFO count reads while waiting for a full packet.
    pub max_drain_polls: u32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            overflow_mask: 0x10,
            data_ready_mask: 0x02,
            overflow_threshold: 1024,
            max_drain_polls: 1000,
        }
    }
}

impl OrientationConfig {
    pub fn with_overflow_threshold(mut self, bytes: u16) -> Self {
        self.overflow_threshold = bytes;
        self
    }

    pub fn with_max_drain_polls(mut self, polls: u32) -> Self {
        self.max_drain_polls = polls;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquirerState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// The outcome of one [`OrientationAcquirer::poll`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Poll {
    /// A fresh orientation sample.
    DataReady(Attitude),
    /// The FIFO overflowed and was reset.
    Overflow,
    /// Nothing new since the last poll.
    NoNewSample,
    /// The sensor raised an interrupt this acquirer doesn't handle.
    Unhandled(u8),
}

#[derive(Debug, PartialEq, Eq)]
pub enum AcquireError<E> {
    /// The sensor hasn't been successfully initialized.
    NotReady,
    /// The sensor's packet doesn't fit in the packet buffer.
    PacketTooLarge(u16),
    /// A full packet never arrived in the FIFO.
    DrainTimeout,
    Sensor(E),
}

impl<E> From<E> for AcquireError<E> {
    fn from(error: E) -> Self {
        AcquireError::Sensor(error)
    }
}

pub struct OrientationAcquirer<'a, S> {
    sensor: S,
    data_ready: &'a DataReady,
    state: AcquirerState,
    packet_size: u16,
    fifo_count: u16,
    buffer: [u8; BUFFER_SIZE],
    config: OrientationConfig,
}

impl<'a, S> OrientationAcquirer<'a, S>
where
    S: MotionSensor,
{
    pub fn new(sensor: S, data_ready: &'a DataReady, config: OrientationConfig) -> Self {
        Self {
            sensor,
            data_ready,
            state: AcquirerState::Uninitialized,
            packet_size: 0,
            fifo_count: 0,
            buffer: [0; BUFFER_SIZE],
            config,
        }
    }

    pub fn state(&self) -> AcquirerState {
        self.state
    }

    pub fn packet_size(&self) -> u16 {
        self.packet_size
    }

    /// FIFO byte count as last observed.
    pub fn fifo_count(&self) -> u16 {
        self.fifo_count
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Configure the sensor and its motion processor.
    ///
    /// On failure the acquirer is left [`AcquirerState::Failed`] and every
    /// [`poll`](Self::poll) returns [`AcquireError::NotReady`] until this succeeds.
    pub fn initialize(&mut self) -> Result<(), AcquireError<S::Error>> {
        self.state = AcquirerState::Initializing;

        let packet_size = match self.sensor.initialize() {
            Ok(size) if size as usize > BUFFER_SIZE => {
                log::error!("orientation packet of {} bytes is too large", size);
                self.state = AcquirerState::Failed;
                return Err(AcquireError::PacketTooLarge(size));
            }
            Ok(size) => size,
            Err(error) => {
                log::error!("motion sensor initialization failed");
                self.state = AcquirerState::Failed;
                return Err(AcquireError::Sensor(error));
            }
        };

        self.packet_size = packet_size;
        self.fifo_count = 0;
        self.state = AcquirerState::Ready;
        log::info!("motion sensor ready ({} byte packets)", packet_size);

        Ok(())
    }

    /// Acquire at most one orientation sample.
    pub fn poll(&mut self) -> Result<Poll, AcquireError<S::Error>> {
        if self.state != AcquirerState::Ready {
            return Err(AcquireError::NotReady);
        }

        if !self.data_ready.take() && self.fifo_count < self.packet_size {
            return Ok(Poll::NoNewSample);
        }

        let status = self.sensor.interrupt_status()?;
        self.fifo_count = self.sensor.fifo_count()?;

        if status & self.config.overflow_mask != 0
            || self.fifo_count >= self.config.overflow_threshold
        {
            self.sensor.reset_fifo()?;
            self.fifo_count = 0;
            log::warn!("motion sensor FIFO overflow");
            return Ok(Poll::Overflow);
        }

        if status & self.config.data_ready_mask == 0 {
            log::warn!("unhandled motion sensor interrupt status {:#04x}", status);
            return Ok(Poll::Unhandled(status));
        }

        self.drain().map(Poll::DataReady)
    }

    fn drain(&mut self) -> Result<Attitude, AcquireError<S::Error>> {
        let mut polls = 0;
        while self.fifo_count < self.packet_size {
            if polls >= self.config.max_drain_polls {
                log::warn!(
                    "timed out waiting for orientation packet ({} of {} bytes)",
                    self.fifo_count,
                    self.packet_size
                );
                return Err(AcquireError::DrainTimeout);
            }
            self.fifo_count = self.sensor.fifo_count()?;
            polls += 1;
        }

        let packet = &mut self.buffer[..self.packet_size as usize];
        self.sensor.read_fifo(packet)?;
        self.fifo_count -= self.packet_size;

        let attitude = self.sensor.decode(packet);
        log::trace!(
            "orientation yaw {} pitch {} roll {}",
            attitude.yaw,
            attitude.pitch,
            attitude.roll
        );

        Ok(attitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: u16 = 42;

    #[derive(Debug, PartialEq)]
    struct BusError;

    #[derive(Default)]
    struct Sensor {
        fail_init: bool,
        packet_size: u16,
        status: u8,
        /// Successive FIFO counts, the last one repeats.
        counts: [u16; 4],
        reads: usize,
        resets: usize,
        packets: usize,
    }

    impl Sensor {
        fn new(status: u8, counts: [u16; 4]) -> Self {
            Self {
                packet_size: PACKET,
                status,
                counts,
                ..Self::default()
            }
        }
    }

    impl MotionSensor for Sensor {
        type Error = BusError;

        fn initialize(&mut self) -> Result<u16, BusError> {
            if self.fail_init {
                Err(BusError)
            } else {
                Ok(self.packet_size)
            }
        }

        fn interrupt_status(&mut self) -> Result<u8, BusError> {
            Ok(self.status)
        }

        fn fifo_count(&mut self) -> Result<u16, BusError> {
            let count = self.counts[self.reads.min(self.counts.len() - 1)];
            self.reads += 1;
            Ok(count)
        }

        fn reset_fifo(&mut self) -> Result<(), BusError> {
            self.resets += 1;
            Ok(())
        }

        fn read_fifo(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
            assert_eq!(buffer.len(), self.packet_size as usize);
            self.packets += 1;
            buffer[0] = self.packets as u8;
            Ok(())
        }

        fn decode(&self, packet: &[u8]) -> Attitude {
            Attitude::new(packet[0] as f32, 0.5, -0.5)
        }
    }

    fn ready(sensor: Sensor, flag: &DataReady) -> OrientationAcquirer<'_, Sensor> {
        let mut acquirer = OrientationAcquirer::new(sensor, flag, OrientationConfig::default());
        acquirer.initialize().unwrap();
        acquirer
    }

    #[test]
    fn it_requires_initialization() {
        let flag = DataReady::new();
        let mut acquirer = OrientationAcquirer::new(
            Sensor::new(0x02, [PACKET; 4]),
            &flag,
            OrientationConfig::default(),
        );
        assert_eq!(acquirer.state(), AcquirerState::Uninitialized);
        assert_eq!(acquirer.poll(), Err(AcquireError::NotReady));
    }

    #[test]
    fn failed_initialization_can_be_retried() {
        let flag = DataReady::new();
        let mut sensor = Sensor::new(0x02, [PACKET; 4]);
        sensor.fail_init = true;
        let mut acquirer = OrientationAcquirer::new(sensor, &flag, OrientationConfig::default());

        assert_eq!(acquirer.initialize(), Err(AcquireError::Sensor(BusError)));
        assert_eq!(acquirer.state(), AcquirerState::Failed);
        flag.signal();
        assert_eq!(acquirer.poll(), Err(AcquireError::NotReady));

        acquirer.sensor_mut().fail_init = false;
        acquirer.initialize().unwrap();
        assert_eq!(acquirer.state(), AcquirerState::Ready);
        assert_eq!(acquirer.packet_size(), PACKET);
    }

    #[test]
    fn oversized_packets_fail() {
        let flag = DataReady::new();
        let mut sensor = Sensor::new(0x02, [PACKET; 4]);
        sensor.packet_size = 65;
        let mut acquirer = OrientationAcquirer::new(sensor, &flag, OrientationConfig::default());

        assert_eq!(acquirer.initialize(), Err(AcquireError::PacketTooLarge(65)));
        assert_eq!(acquirer.state(), AcquirerState::Failed);
    }

    #[test]
    fn no_interrupt_means_no_sample() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x02, [PACKET; 4]), &flag);

        assert_eq!(acquirer.poll(), Ok(Poll::NoNewSample));
        assert_eq!(acquirer.sensor().reads, 0);
    }

    #[test]
    fn it_reads_one_packet_per_poll() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x02, [PACKET; 4]), &flag);

        flag.signal();
        assert_eq!(
            acquirer.poll(),
            Ok(Poll::DataReady(Attitude::new(1., 0.5, -0.5)))
        );
        assert_eq!(acquirer.fifo_count(), 0);
        assert!(!flag.is_set());
        assert_eq!(acquirer.poll(), Ok(Poll::NoNewSample));
    }

    #[test]
    fn buffered_packets_are_read_without_interrupt() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x02, [2 * PACKET; 4]), &flag);

        flag.signal();
        assert!(matches!(acquirer.poll(), Ok(Poll::DataReady(_))));
        assert_eq!(acquirer.fifo_count(), PACKET);

        // A full packet is still tracked in the FIFO
        assert_eq!(
            acquirer.poll(),
            Ok(Poll::DataReady(Attitude::new(2., 0.5, -0.5)))
        );
    }

    #[test]
    fn it_waits_for_a_full_packet() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x02, [10, 20, 30, PACKET]), &flag);

        flag.signal();
        assert!(matches!(acquirer.poll(), Ok(Poll::DataReady(_))));
        assert_eq!(acquirer.sensor().reads, 4);
    }

    #[test]
    fn drain_is_bounded() {
        let flag = DataReady::new();
        let mut acquirer = OrientationAcquirer::new(
            Sensor::new(0x02, [10; 4]),
            &flag,
            OrientationConfig::default().with_max_drain_polls(5),
        );
        acquirer.initialize().unwrap();

        flag.signal();
        assert_eq!(acquirer.poll(), Err(AcquireError::DrainTimeout));
        assert_eq!(acquirer.sensor().reads, 6);
        assert_eq!(acquirer.state(), AcquirerState::Ready);
    }

    #[test]
    fn overflow_resets_then_resumes() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x12, [1024, PACKET, PACKET, PACKET]), &flag);

        flag.signal();
        assert_eq!(acquirer.poll(), Ok(Poll::Overflow));
        assert_eq!(acquirer.sensor().resets, 1);
        assert_eq!(acquirer.fifo_count(), 0);

        acquirer.sensor_mut().status = 0x02;
        flag.signal();
        assert!(matches!(acquirer.poll(), Ok(Poll::DataReady(_))));
        assert_eq!(acquirer.sensor().resets, 1);
    }

    #[test]
    fn overflow_by_count() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x02, [1024; 4]), &flag);

        flag.signal();
        assert_eq!(acquirer.poll(), Ok(Poll::Overflow));
    }

    #[test]
    fn unhandled_status() {
        let flag = DataReady::new();
        let mut acquirer = ready(Sensor::new(0x01, [0; 4]), &flag);

        flag.signal();
        assert_eq!(acquirer.poll(), Ok(Poll::Unhandled(0x01)));
        assert_eq!(acquirer.sensor().packets, 0);
    }
}
