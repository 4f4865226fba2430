//! Fixed-cadence cooperative scheduler.
//!
//! Every tick of the loop period the scheduler runs all high priority tasks
//! and each other task whose interval (in ticks) has elapsed.

use embedded_time::duration::Microseconds;
use embedded_time::Clock;

use crate::{micros, Error};

mod task;
pub use task::{Event, Task};

pub struct Scheduler<'a, C, T, E = Error> {
    tasks: &'a mut [Task<T, E>],
    clock: &'a C,
    tick_counter: u16,
    loop_rate_hz: u16,
    loop_period_us: u32,
    next_tick_us: Option<u32>,
    overruns: u32,
}

impl<'a, C, T, E> Scheduler<'a, C, T, E>
where
    C: Clock<T = u32>,
    E: From<Error>,
{
    pub fn new(tasks: &'a mut [Task<T, E>], clock: &'a C, loop_rate_hz: u16) -> Self {
        let loop_period_us = 1_000_000u32
            .checked_div(loop_rate_hz as u32)
            .unwrap_or(0);
        Self {
            tasks,
            clock,
            tick_counter: 0,
            loop_rate_hz,
            loop_period_us,
            next_tick_us: None,
            overruns: 0,
        }
    }

    pub fn loop_rate_hz(&self) -> u16 {
        self.loop_rate_hz
    }

    pub fn loop_period_us(&self) -> u32 {
        self.loop_period_us
    }

    pub fn tick_counter(&self) -> u16 {
        self.tick_counter
    }

    /// Number of ticks that started a full period or more late.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Run the tasks forever at the loop rate.
    pub fn run(&mut self, system: &mut T) -> Result<(), E> {
        loop {
            self.tick(system)?;
        }
    }

    /// Wait for the next tick and run every task that is due.
    pub fn tick(&mut self, system: &mut T) -> Result<(), E> {
        let now = self.wait_for_tick()?;

        self.tick_counter = self.tick_counter.wrapping_add(1);
        self.run_tasks(system, now)
    }

    /// Busy-wait until the start of the next loop period.
    pub fn wait_for_tick(&mut self) -> Result<Microseconds<u32>, Error> {
        let mut now = micros(self.clock)?.0;
        let next = *self.next_tick_us.get_or_insert(now);

        // Signed difference handles the clock wrapping around
        while (now.wrapping_sub(next) as i32) < 0 {
            now = micros(self.clock)?.0;
        }

        let late = now.wrapping_sub(next);
        if self.loop_period_us > 0 && late >= self.loop_period_us {
            // Skip the missed ticks rather than running them back to back
            self.overruns += 1;
            log::debug!("scheduler tick overran by {} us", late);
            self.next_tick_us = Some(now.wrapping_add(self.loop_period_us));
        } else {
            self.next_tick_us = Some(next.wrapping_add(self.loop_period_us));
        }

        Ok(Microseconds::new(now))
    }

    /// Run every task that is due on the current tick.
    pub fn run_tasks(&mut self, system: &mut T, now: Microseconds<u32>) -> Result<(), E> {
        let tick = self.tick_counter;

        for task in self.tasks.iter_mut() {
            let ticks = task.ticks(self.loop_rate_hz);
            if task.ready(tick, ticks).is_none() {
                // this task is not yet scheduled to run again
                continue;
            }

            task.run(Event {
                system: &mut *system,
                now,
                tick,
            })?;
        }

        Ok(())
    }
}
