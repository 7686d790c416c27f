//! Deterministic discrete-event simulation of message-passing systems.
//!
//! Nodes run a [`MessageHandler`] and talk through a simulated network with
//! random bounded latency. Everything happens on a virtual clock driven by a
//! single event queue, so a run is fully determined by its seed.
//!
//! The [`protocol`] module ships two handlers: a ping/pong probe and a
//! sequencer-based total-order multicast.

/// Simulator configuration and logger setup.
pub mod config;

/// Messages exchanged between nodes.
mod message;
pub use message::{Message, MessageId, MessageKind};

/// Node identity, liveness and the handler interface.
mod node;
pub use node::{Liveness, MessageHandler, NodeContext, NodeId, NodeInfo};

/// Protocols built on the simulator.
pub mod protocol;

/// Event scheduler, network model and simulation runner.
pub mod simulation;

/// Tracing subscriber setup.
mod tracing;
