//! Deterministic simulation framework.
//!
//! This module provides infrastructure for running reproducible
//! message-passing simulations on virtual time, with seeded randomness and
//! fault injection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Simulator<H>                        │
//! │                                                          │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │  Scheduler (BinaryHeap<Event>)                      │ │
//! │  │  Ordered by: (timestamp, registration order)        │ │
//! │  └──────────────────────────┬──────────────────────────┘ │
//! │                             │ Deliver / Fail / Action    │
//! │                             ▼                            │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │  Network: node registry, delivery guard, faults     │ │
//! │  │  delay ~ U[1, max_latency] from the RandomSource    │ │
//! │  └──────────────────────────┬──────────────────────────┘ │
//! │                             ▼                            │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │  handlers: Vec<H: MessageHandler>                   │ │
//! │  │  sends → new delivery events                        │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Execution is single-threaded and run-to-completion: each event runs
//! atomically with respect to all others, and events due at the same instant
//! run in the order they were scheduled.

mod errors;
mod fault;
mod network;
mod rng;
mod runner;
mod scheduler;
mod time;
mod timer;

pub use errors::SimulationError;
pub use fault::{FaultConfig, FaultConfigBuilder, Partition};
pub use network::{DropReason, Network, NetworkStats};
pub use rng::{RandomSource, ScriptedDelays, SimulationRng};
pub use runner::{Action, SimEvent, SimulationStats, Simulator, TraceEntry, TraceKind};
pub use scheduler::{Event, EventId, ScheduleError, Scheduler};
pub use time::VirtualTime;
pub use timer::Timer;
