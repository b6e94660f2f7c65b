// ABOUTME: Deadline that the engine polls while evaluating.
// ABOUTME: Lets a handle's timeout stop long evaluations cooperatively.

use std::time::{Duration, Instant};

/// Interrupts an evaluation once a fixed point in time has passed.
/// `None` never fires.
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(timeout: Option<Duration>) -> Self {
        Self {
            at: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

impl fend_core::Interrupt for Deadline {
    fn should_interrupt(&self) -> bool {
        self.expired()
    }
}
