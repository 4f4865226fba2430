//! Shared fixtures for unit tests.

use core::cell::Cell;
use embedded_time::{clock, rate::Fraction, Clock, Instant};

/// A microsecond clock that is moved by hand, or advances by `step` on every read.
pub struct MockClock {
    now: Cell<u32>,
    step: u32,
}

impl MockClock {
    pub fn new(now: u32) -> Self {
        Self {
            now: Cell::new(now),
            step: 0,
        }
    }

    pub fn stepping(now: u32, step: u32) -> Self {
        Self {
            now: Cell::new(now),
            step,
        }
    }

    pub fn set(&self, now: u32) {
        self.now.set(now);
    }

    pub fn advance(&self, micros: u32) {
        self.now.set(self.now.get().wrapping_add(micros));
    }
}

impl Clock for MockClock {
    type T = u32;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

    fn try_now(&self) -> Result<Instant<Self>, clock::Error> {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        Ok(Instant::new(now))
    }
}

extern crate std;

use std::cell::RefCell;
use std::string::String;
use std::vec::Vec;

std::thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = RefCell::new(None);
}

/// Logger that keeps the messages of threads inside [`capture_logs`].
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|captured| {
            if let Some(lines) = captured.borrow_mut().as_mut() {
                lines.push(std::format!("{}", record.args()));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Run `f` and return every message it logged on this thread.
pub fn capture_logs<F: FnOnce()>(f: F) -> Vec<String> {
    // Another test may have installed it already
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);

    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    f();
    CAPTURED.with(|captured| captured.borrow_mut().take().unwrap_or_default())
}
