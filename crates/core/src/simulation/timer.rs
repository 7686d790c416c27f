//! One-shot timers on virtual time.

use super::{
    errors::SimulationError,
    runner::{Action, SimEvent, Simulator},
    scheduler::{EventId, Scheduler},
};

/// Runs an action once, `interval` ticks after it is started.
///
/// Periodic behaviour is built by starting a fresh timer from inside the
/// fired action.
pub struct Timer<H> {
    interval: u64,
    label: String,
    action: Action<H>,
}

impl<H> Timer<H> {
    pub fn new<F>(interval: u64, action: F) -> Self
    where
        F: FnOnce(&mut Simulator<H>) -> Result<(), SimulationError> + 'static,
    {
        Self {
            interval,
            label: format!("timer +{interval}"),
            action: Box::new(action),
        }
    }

    /// Label recorded in the simulation trace when the timer fires.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Schedules the action at `now + interval`.
    pub fn start(self, sim: &mut Simulator<H>) -> EventId {
        self.schedule_on(sim.scheduler_mut())
    }

    pub(crate) fn schedule_on(self, scheduler: &mut Scheduler<SimEvent<H>>) -> EventId {
        scheduler.schedule_after(
            self.interval,
            SimEvent::Action {
                label: self.label,
                action: self.action,
            },
        )
    }
}

impl<H> std::fmt::Debug for Timer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("interval", &self.interval)
            .field("label", &self.label)
            .finish()
    }
}
