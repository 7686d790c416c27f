//! Virtual clock for deterministic simulation.
//!
//! Time is a plain tick counter with no relation to wall-clock time. It only
//! moves when the scheduler dequeues an event, and it never moves backwards.

use std::fmt;

/// Monotonic virtual clock, starting at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualTime {
    current: u64,
}

impl VirtualTime {
    /// Creates a new virtual time starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current time in ticks.
    pub fn now(&self) -> u64 {
        self.current
    }

    /// Advances the clock to `target`.
    ///
    /// Targets at or before the current time leave the clock untouched.
    /// Returns true if the clock moved.
    pub fn advance_to(&mut self, target: u64) -> bool {
        if target <= self.current {
            return false;
        }
        self.current = target;
        true
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(VirtualTime::new().now(), 0);
    }

    #[test]
    fn test_never_goes_backwards() {
        let mut vt = VirtualTime::new();
        assert!(vt.advance_to(500));
        assert_eq!(vt.now(), 500);

        assert!(!vt.advance_to(300));
        assert_eq!(vt.now(), 500);

        assert!(!vt.advance_to(500));
        assert_eq!(vt.now(), 500);
    }
}
