//! The net lock.
//!
//! Every public mutator and the step method run under one mutex around the
//! whole engine; a step holds the lock for its entire duration, so no
//! caller ever observes a partially-mutated arena. Engine methods never
//! re-acquire the lock, so a plain (non-reentrant) mutex suffices.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::errors::NetResult;
use crate::nodenet::Nodenet;

#[derive(Clone)]
pub struct SharedNodenet {
    inner: Arc<Mutex<Nodenet>>,
}

impl SharedNodenet {
    pub fn new(net: Nodenet) -> Self {
        Self {
            inner: Arc::new(Mutex::new(net)),
        }
    }

    /// Acquires the net lock for a batch of facade calls.
    pub fn lock(&self) -> MutexGuard<'_, Nodenet> {
        self.inner.lock()
    }

    /// Runs one atomic step and reports the new step count.
    pub fn step(&self) -> NetResult<u64> {
        let mut net = self.lock();
        net.step()?;
        Ok(net.current_step())
    }
}
