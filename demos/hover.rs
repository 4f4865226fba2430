//! Host simulation of a hovering X quad-copter.
//!
//! The receiver and motion sensor interrupts are simulated by tasks that run
//! just before the control loop on every scheduler tick.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::PinState;
use embedded_time::{clock, rate::Fraction, Clock, Instant};
use log::{Level, LevelFilter, Metadata, Record};
use quad_stabilizer::copter::{control_task, status_task};
use quad_stabilizer::orientation::DataReady;
use quad_stabilizer::receiver::ChannelDecoder;
use quad_stabilizer::scheduler::{Event, Task};
use quad_stabilizer::{Actuator, Attitude, Config, Error, MotionSensor, QuadCopter, Scheduler, ESC};

static DECODER: ChannelDecoder<5> = ChannelDecoder::new();
static DATA_READY: DataReady = DataReady::new();

const FRAME_US: u32 = 20_000;

struct StdClock {
    start: std::time::Instant,
}

impl Clock for StdClock {
    type T = u32;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

    fn try_now(&self) -> Result<Instant<Self>, clock::Error> {
        Ok(Instant::new(self.start.elapsed().as_micros() as u32))
    }
}

struct StdDelay;

impl DelayMs<u16> for StdDelay {
    fn delay_ms(&mut self, ms: u16) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}

/// A sensor starting 10 degrees nose up and settling back to level.
struct SimulatedSensor {
    start: std::time::Instant,
}

impl MotionSensor for SimulatedSensor {
    type Error = ();

    fn initialize(&mut self) -> Result<u16, ()> {
        Ok(42)
    }

    fn interrupt_status(&mut self) -> Result<u8, ()> {
        Ok(0x02)
    }

    fn fifo_count(&mut self) -> Result<u16, ()> {
        Ok(42)
    }

    fn reset_fifo(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn read_fifo(&mut self, _buffer: &mut [u8]) -> Result<(), ()> {
        Ok(())
    }

    fn decode(&self, _packet: &[u8]) -> Attitude {
        let t = self.start.elapsed().as_secs_f32();
        Attitude::new(0., 10f32.to_radians() * (-t).exp(), 0.)
    }
}

struct PrintingESC {
    id: u8,
    pulse_width: u16,
}

impl Actuator for PrintingESC {
    fn output(&mut self, pulse_width: u16) {
        if pulse_width != self.pulse_width {
            log::debug!("motor {}: {} us", self.id, pulse_width);
        }
        self.pulse_width = pulse_width;
    }
}

impl ESC for PrintingESC {
    fn arm(&mut self) {
        log::info!("motor {} armed", self.id);
        self.output(1200);
    }
}

type Copter = QuadCopter<'static, StdClock, SimulatedSensor, PrintingESC, 5, 4>;

/// Pilot holding centered sticks, half throttle and the arm switch on.
fn radio(event: Event<'_, Copter>) -> Result<(), Error> {
    let end = event.now.0;
    let start = end.saturating_sub(FRAME_US);
    for (input, high) in [1500, 1500, 1500, 1500, 2000].iter().enumerate() {
        DECODER.on_edge(input, PinState::High, start);
        DECODER.on_edge(input, PinState::Low, start + high);
        DECODER.on_edge(input, PinState::High, end);
    }
    DATA_READY.signal();
    Ok(())
}

struct StdoutLogger;

impl log::Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{:<5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn main() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .unwrap();

    let start = std::time::Instant::now();
    let clock: &'static StdClock = Box::leak(Box::new(StdClock { start }));

    let motors = [0, 1, 2, 3].map(|id| PrintingESC { id, pulse_width: 0 });
    let mut copter: Copter = QuadCopter::new(
        clock,
        &DECODER,
        SimulatedSensor { start },
        &DATA_READY,
        motors,
        Config::quad_x(),
    );
    copter.init(&mut StdDelay);

    let mut tasks = [
        Task::high_priority(radio),
        Task::high_priority(control_task),
        Task::new(status_task).with_hz(2.),
    ];
    let mut scheduler = Scheduler::new(&mut tasks, clock, copter.config().loop_rate_hz);

    // Three seconds of flight
    for _ in 0..300 {
        scheduler.tick(&mut copter).unwrap();
    }

    log::info!("{} late ticks", scheduler.overruns());
}
