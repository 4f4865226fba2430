mod rcesc;
pub use rcesc::{Builder, RCESC};

use super::Actuator;

/// Electronic speed controller
pub trait ESC: Actuator {
    /// Arm this ESC.
    fn arm(&mut self);
}

impl<T> ESC for &mut T
where
    T: ESC + ?Sized,
{
    fn arm(&mut self) {
        (**self).arm()
    }
}
