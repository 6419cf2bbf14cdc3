//! The world-adapter contract.
//!
//! Sensors pull their values from named datasources at the start of the
//! Calculate pass; actuator activations are summed per datatarget and
//! pushed back after it. The adapter itself lives outside the engine.

use crate::FloatX;

pub trait WorldAdapter: Send {
    /// Called once at the top of every step, before any operator runs.
    fn snapshot(&mut self) {}

    /// Current value of a datasource; `None` is treated as 0.
    fn get_datasource(&mut self, nodenet_uid: &str, key: &str) -> Option<FloatX>;

    /// Receives the summed actuator activation for a datatarget.
    fn set_datatarget(&mut self, nodenet_uid: &str, key: &str, value: FloatX);
}
