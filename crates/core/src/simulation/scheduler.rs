//! Deterministic event scheduler for simulation.
//!
//! The scheduler processes events in a strict total order based on:
//! 1. Event timestamp (earlier first)
//! 2. Event ID, i.e. registration order (earlier first)
//!
//! The second key is explicit: two events due at the same instant always run
//! in the order they were scheduled, independent of how the heap breaks ties.

use std::{cmp::Ordering, collections::BinaryHeap, fmt};

use super::time::VirtualTime;

/// Unique identifier for an event, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned when an event cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("cannot schedule event at {due}, virtual time is already {now}")]
    InPast { due: u64, now: u64 },
}

/// A scheduled event carrying an arbitrary payload.
#[derive(Debug)]
pub struct Event<T> {
    /// When this event should be processed (virtual ticks)
    pub timestamp: u64,
    /// Registration order, used for tie-breaking
    pub id: EventId,
    /// What to do when the event fires
    pub payload: T,
}

impl<T> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Event<T> {}

impl<T> PartialOrd for Event<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Event<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: reverse ordering so the smallest (timestamp, id) pops first.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Deterministic event scheduler.
///
/// Owns the virtual clock. The clock only advances when an event is popped by
/// [`Scheduler::step`] and is observable by whatever runs that event.
pub struct Scheduler<T> {
    /// Virtual time for the simulation
    time: VirtualTime,
    /// Priority queue of pending events
    pending_events: BinaryHeap<Event<T>>,
    /// Counter for generating unique event IDs
    next_event_id: u64,
    /// Number of events popped so far
    processed: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            time: VirtualTime::new(),
            pending_events: BinaryHeap::new(),
            next_event_id: 0,
            processed: 0,
        }
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> u64 {
        self.time.now()
    }

    /// Returns the number of pending events.
    pub fn pending_count(&self) -> usize {
        self.pending_events.len()
    }

    /// Returns the number of events processed so far.
    pub fn processed_count(&self) -> u64 {
        self.processed
    }

    /// Schedules an event at the given absolute timestamp.
    ///
    /// Timestamps earlier than the current virtual time are rejected; a
    /// timestamp equal to it is allowed and runs after everything already
    /// queued for that instant.
    pub fn schedule_at(&mut self, timestamp: u64, payload: T) -> Result<EventId, ScheduleError> {
        let now = self.now();
        if timestamp < now {
            return Err(ScheduleError::InPast {
                due: timestamp,
                now,
            });
        }
        Ok(self.push(timestamp, payload))
    }

    /// Schedules an event after the given delay from now.
    pub fn schedule_after(&mut self, delay: u64, payload: T) -> EventId {
        let timestamp = self.now().saturating_add(delay);
        self.push(timestamp, payload)
    }

    fn push(&mut self, timestamp: u64, payload: T) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        self.pending_events.push(Event {
            timestamp,
            id,
            payload,
        });
        id
    }

    /// Returns the timestamp of the next pending event, if any.
    pub fn next_event_time(&self) -> Option<u64> {
        self.pending_events.peek().map(|e| e.timestamp)
    }

    /// Pops the next pending event, advancing time to its timestamp.
    ///
    /// Returns None if no events are pending.
    pub fn step(&mut self) -> Option<Event<T>> {
        let event = self.pending_events.pop()?;
        self.time.advance_to(event.timestamp);
        self.processed += 1;
        tracing::trace!(timestamp = event.timestamp, id = event.id.0, "Processing event");
        Some(event)
    }

    /// Advances the clock to `target` without processing anything.
    ///
    /// Fails if an event due before `target` is still pending, since
    /// skipping over it would break monotonic execution.
    pub fn advance_to(&mut self, target: u64) -> Result<(), ScheduleError> {
        match self.next_event_time() {
            Some(next) if next < target => Err(ScheduleError::InPast {
                due: next,
                now: target,
            }),
            _ => {
                self.time.advance_to(target);
                Ok(())
            }
        }
    }

    /// Drains all pending events without processing them.
    pub fn drain_pending(&mut self) -> Vec<Event<T>> {
        let mut events = std::mem::take(&mut self.pending_events).into_sorted_vec();
        // into_sorted_vec is ascending by Ord, which is reversed for the min-heap
        events.reverse();
        events
    }
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending_count", &self.pending_count())
            .field("processed", &self.processed)
            .finish()
    }
}
