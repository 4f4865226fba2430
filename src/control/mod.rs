//! Attitude control.

pub mod pid;
pub use pid::{Gains, Pid, PidBank, PidBankConfig, PidConfig};
