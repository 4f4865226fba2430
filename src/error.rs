use embedded_time::{clock, duration::Microseconds, Clock, ConversionError};

/// An error raised while timing a control cycle.
#[derive(Debug)]
pub enum Error {
    Clock(clock::Error),
    Time(ConversionError),
}

impl From<clock::Error> for Error {
    fn from(clock_error: clock::Error) -> Self {
        Error::Clock(clock_error)
    }
}

impl From<ConversionError> for Error {
    fn from(time_error: ConversionError) -> Self {
        Error::Time(time_error)
    }
}

/// Read the current time of `clock` in microseconds since its epoch.
///
/// The value wraps like a hardware microsecond counter.
pub fn micros<C>(clock: &C) -> Result<Microseconds<u32>, Error>
where
    C: Clock<T = u32>,
{
    let instant = clock.try_now()?;
    Microseconds::try_from(instant.duration_since_epoch()).map_err(Into::into)
}
