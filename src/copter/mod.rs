//! The quad-copter control loop.
//!
//! Each [`QuadCopter::step`] reads the receiver and the motion sensor once,
//! then either idles the motors (disarmed, or no orientation yet) or runs the
//! attitude PIDs and mixes their demand into motor commands.

use embedded_hal::blocking::delay::DelayMs;
use embedded_time::Clock;

use crate::control::PidBank;
use crate::motor_matrix::{Demand, Mixer, MotorCommand};
use crate::orientation::{AcquireError, DataReady, OrientationAcquirer, Poll};
use crate::receiver::{ChannelDecoder, NormalizedCommand, Receiver};
use crate::scheduler::{Event, Task};
use crate::{micros, Attitude, Config, Error, MotionSensor, ESC};

/// Report of one control cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cycle<const N: usize> {
    /// Time (in microseconds) the cycle started.
    pub now: u32,
    pub command: NormalizedCommand,
    /// The receiver link was lost and `command` is the fail-safe.
    pub stale: bool,
    /// The latest valid orientation, if one was ever acquired.
    pub orientation: Option<Attitude>,
    /// The arm channel was above the arm threshold.
    pub armed: bool,
    /// PID correction per axis, zero when the motors idled.
    pub correction: Attitude,
    pub outputs: [MotorCommand; N],
}

impl<const N: usize> Cycle<N> {
    /// Returns `true` if the PIDs and mixer drove the motors this cycle.
    pub fn is_flying(&self) -> bool {
        self.armed && self.orientation.is_some()
    }
}

pub struct QuadCopter<'a, C, S, E, const P: usize, const N: usize> {
    clock: &'a C,
    receiver: Receiver<'a, P>,
    orientation: OrientationAcquirer<'a, S>,
    pub pid: PidBank,
    mixer: Mixer<N>,
    motors: [E; N],
    config: Config<N>,
    last_orientation: Option<Attitude>,
    last_cycle: Option<Cycle<N>>,
}

impl<'a, C, S, E, const P: usize, const N: usize> QuadCopter<'a, C, S, E, P, N>
where
    C: Clock<T = u32>,
    S: MotionSensor,
    E: ESC,
{
    pub fn new(
        clock: &'a C,
        decoder: &'a ChannelDecoder<P>,
        sensor: S,
        data_ready: &'a DataReady,
        motors: [E; N],
        config: Config<N>,
    ) -> Self {
        Self {
            clock,
            receiver: Receiver::new(decoder, config.channels, config.receiver),
            orientation: OrientationAcquirer::new(sensor, data_ready, config.orientation),
            pid: PidBank::new(config.pid),
            mixer: Mixer::new(config.mixer),
            motors,
            config,
            last_orientation: None,
            last_cycle: None,
        }
    }

    pub fn config(&self) -> &Config<N> {
        &self.config
    }

    pub fn receiver(&self) -> &Receiver<'a, P> {
        &self.receiver
    }

    pub fn orientation(&self) -> &OrientationAcquirer<'a, S> {
        &self.orientation
    }

    pub fn orientation_mut(&mut self) -> &mut OrientationAcquirer<'a, S> {
        &mut self.orientation
    }

    pub fn motors(&self) -> &[E; N] {
        &self.motors
    }

    pub fn last_cycle(&self) -> Option<&Cycle<N>> {
        self.last_cycle.as_ref()
    }

    /// Initialize the motion sensor, then arm every ESC and hold the arming
    /// pulse for `arm_delay_ms` so the ESCs register it.
    ///
    /// A sensor failure is not fatal: the copter keeps its motors idle
    /// until an orientation sample is acquired.
    pub fn init<D>(&mut self, delay: &mut D)
    where
        D: DelayMs<u16>,
    {
        if self.orientation.initialize().is_err() {
            log::warn!("motors stay idle until the motion sensor is initialized");
        }

        for motor in &mut self.motors {
            motor.arm();
        }
        log::debug!("holding arm pulse for {} ms", self.config.arm_delay_ms);
        delay.delay_ms(self.config.arm_delay_ms);
    }

    /// Run one control cycle.
    pub fn step(&mut self) -> Result<Cycle<N>, Error> {
        let now = micros(self.clock)?.0;

        let reception = self.receiver.read(now);
        let command = reception.command();

        self.acquire();

        let armed = command.arm >= self.config.arm_threshold;
        let (correction, outputs) = match self.last_orientation.filter(|_| armed) {
            Some(measured) => self.control(&command, measured),
            None => (Attitude::default(), self.mixer.idle()),
        };

        for (index, output) in outputs.iter().enumerate() {
            self.set_motor_command(index, *output);
        }

        let cycle = Cycle {
            now,
            command,
            stale: reception.is_stale(),
            orientation: self.last_orientation,
            armed,
            correction,
            outputs,
        };
        self.last_cycle = Some(cycle);

        Ok(cycle)
    }

    /// Output a command to the motor at `index`.
    pub fn set_motor_command(&mut self, index: usize, command: MotorCommand) {
        if let Some(motor) = self.motors.get_mut(index) {
            motor.output(command.pulse_width());
        }
    }

    /// Log a status line for the last cycle.
    pub fn log_status(&self) {
        let cycle = match &self.last_cycle {
            Some(cycle) => cycle,
            None => {
                log::info!("no control cycle yet");
                return;
            }
        };

        let outputs = cycle.outputs.map(MotorCommand::pulse_width);
        let orientation = cycle.orientation.unwrap_or_default();
        log::info!(
            "link {} arm {} throttle {} cmd y/p/r {}/{}/{} att y/p/r {}/{}/{} motors {:?}",
            if cycle.stale { "lost" } else { "ok" },
            cycle.command.arm,
            cycle.command.throttle,
            cycle.command.yaw,
            cycle.command.pitch,
            cycle.command.roll,
            orientation.yaw.to_degrees(),
            orientation.pitch.to_degrees(),
            orientation.roll.to_degrees(),
            outputs
        );
    }

    /// Poll the sensor, keeping the previous sample when nothing new arrives.
    fn acquire(&mut self) {
        match self.orientation.poll() {
            Ok(Poll::DataReady(sample)) => self.last_orientation = Some(sample),
            Ok(Poll::NoNewSample) | Ok(Poll::Overflow) | Ok(Poll::Unhandled(_)) => {}
            Err(AcquireError::Sensor(_)) => log::warn!("motion sensor read failed"),
            Err(AcquireError::NotReady) => log::trace!("motion sensor not ready"),
            Err(AcquireError::DrainTimeout) | Err(AcquireError::PacketTooLarge(_)) => {}
        }
    }

    fn control(
        &mut self,
        command: &NormalizedCommand,
        measured: Attitude,
    ) -> (Attitude, [MotorCommand; N]) {
        let target = Attitude::new(
            (command.yaw as f32).to_radians(),
            (command.pitch as f32).to_radians(),
            (command.roll as f32).to_radians(),
        );
        let correction = self.pid.update(target, measured, self.config.dt());

        let outputs = self.mixer.mix(Demand::new(
            correction.pitch,
            correction.roll,
            correction.yaw,
            command.throttle as f32,
        ));

        log::trace!(
            "correction y/p/r {}/{}/{}",
            correction.yaw,
            correction.pitch,
            correction.roll
        );

        (correction, outputs)
    }
}

/// Run one control cycle.
pub fn control_task<C, S, E, const P: usize, const N: usize>(
    event: Event<'_, QuadCopter<'_, C, S, E, P, N>>,
) -> Result<(), Error>
where
    C: Clock<T = u32>,
    S: MotionSensor,
    E: ESC,
{
    event.system.step().map(|_| ())
}

/// Log the status of the last control cycle.
pub fn status_task<C, S, E, const P: usize, const N: usize>(
    event: Event<'_, QuadCopter<'_, C, S, E, P, N>>,
) -> Result<(), Error>
where
    C: Clock<T = u32>,
    S: MotionSensor,
    E: ESC,
{
    event.system.log_status();
    Ok(())
}

/// The default tasks for a quad-copter: the control loop on every tick
/// and a status line once a second.
pub fn quad_copter_tasks<'a, C, S, E, const P: usize, const N: usize>(
) -> [Task<QuadCopter<'a, C, S, E, P, N>>; 2]
where
    C: Clock<T = u32>,
    S: MotionSensor,
    E: ESC,
{
    [
        Task::high_priority(control_task),
        Task::new(status_task).with_hz(1.),
    ]
}
