//! The simulation runner: scheduler, network and protocol handlers wired
//! together into one run-to-completion event loop.

use std::fmt;

use super::{
    errors::SimulationError,
    fault::FaultConfig,
    network::{DropReason, Network, NetworkStats},
    rng::{RandomSource, SimulationRng},
    scheduler::{EventId, Scheduler},
};
use crate::{
    config::SimulatorConfig,
    message::{Message, MessageId, MessageKind},
    node::{MessageHandler, NodeContext, NodeId, NodeInfo},
};

/// A deferred action run against the whole simulator.
pub type Action<H> = Box<dyn FnOnce(&mut Simulator<H>) -> Result<(), SimulationError>>;

/// Payload of a scheduled event.
pub enum SimEvent<H> {
    /// A message reaching its delivery time.
    Deliver {
        from: NodeId,
        to: NodeId,
        message: Message,
    },
    /// Scheduled fault injection.
    Fail(NodeId),
    /// Scheduled recovery.
    Recover(NodeId),
    /// Caller-supplied action (timers, driver events).
    Action { label: String, action: Action<H> },
}

impl<H> fmt::Debug for SimEvent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::Deliver { from, to, message } => f
                .debug_struct("Deliver")
                .field("from", from)
                .field("to", to)
                .field("message", message)
                .finish(),
            SimEvent::Fail(node) => f.debug_tuple("Fail").field(node).finish(),
            SimEvent::Recover(node) => f.debug_tuple("Recover").field(node).finish(),
            SimEvent::Action { label, .. } => {
                f.debug_struct("Action").field("label", label).finish()
            }
        }
    }
}

/// What happened when an event was executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    Delivered {
        from: NodeId,
        to: NodeId,
        message: MessageId,
        kind: MessageKind,
        sequence_number: Option<u64>,
    },
    Dropped {
        from: NodeId,
        to: NodeId,
        message: MessageId,
        reason: DropReason,
    },
    Failed(NodeId),
    Recovered(NodeId),
    Action(String),
}

/// One executed event, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub time: u64,
    pub event: EventId,
    pub kind: TraceKind,
}

/// Summary returned by [`Simulator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub final_time: u64,
    pub network: NetworkStats,
}

/// Deterministic discrete-event simulator.
///
/// Owns the scheduler, the node registry and one handler `H` per node. Given
/// the same configuration, random source and sequence of calls, two runs
/// produce identical traces.
///
/// # Example
///
/// ```
/// use vsim::{
///     config::SimulatorConfig,
///     protocol::PingPong,
///     simulation::Simulator,
///     Message, MessageKind,
/// };
///
/// let mut sim = Simulator::new(SimulatorConfig::default().with_seed(234))?;
/// let host1 = sim.add_node("1", PingPong::new());
/// let host2 = sim.add_node("2", PingPong::new());
///
/// sim.send_message(host1, host2, Message::new(1u64, host1, host2, MessageKind::Ping))?;
/// sim.run()?;
///
/// assert_eq!(sim.handler(host1)?.received().len(), 1);
/// # Ok::<(), vsim::simulation::SimulationError>(())
/// ```
pub struct Simulator<H> {
    scheduler: Scheduler<SimEvent<H>>,
    network: Network,
    handlers: Vec<H>,
    trace: Vec<TraceEntry>,
}

impl<H> Simulator<H> {
    /// Creates a simulator drawing delays from a [`SimulationRng`] seeded with
    /// `config.random_seed`.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulationError> {
        let rng = SimulationRng::new(config.random_seed);
        Self::with_random_source(config, rng)
    }

    /// Creates a simulator with an explicit random source.
    pub fn with_random_source(
        config: SimulatorConfig,
        rng: impl RandomSource + 'static,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        tracing::debug!(
            seed = config.random_seed,
            max_latency = config.max_latency,
            "Creating simulator"
        );
        Ok(Self {
            scheduler: Scheduler::new(),
            network: Network::new(config, Box::new(rng)),
            handlers: Vec::new(),
            trace: Vec::new(),
        })
    }

    /// Registers a node with its protocol handler. Ids are handed out
    /// sequentially from 0.
    pub fn add_node(&mut self, name: impl Into<String>, handler: H) -> NodeId {
        let id = self.network.register(name.into());
        self.handlers.push(handler);
        id
    }

    pub fn node_count(&self) -> usize {
        self.network.node_count()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.network.nodes().iter().map(NodeInfo::id)
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeInfo, SimulationError> {
        self.network.node(id)
    }

    pub fn handler(&self, id: NodeId) -> Result<&H, SimulationError> {
        self.handlers
            .get(id.as_usize())
            .ok_or(SimulationError::UnknownNode(id))
    }

    pub fn handler_mut(&mut self, id: NodeId) -> Result<&mut H, SimulationError> {
        self.handlers
            .get_mut(id.as_usize())
            .ok_or(SimulationError::UnknownNode(id))
    }

    pub fn config(&self) -> &SimulatorConfig {
        self.network.config()
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn stats(&self) -> &NetworkStats {
        self.network.stats()
    }

    /// Executed events so far, in execution order.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Replaces the message-level fault configuration.
    pub fn set_fault_config(&mut self, faults: FaultConfig) -> Result<(), SimulationError> {
        faults.validate()?;
        self.network.set_fault_config(faults);
        Ok(())
    }

    pub fn fault_config(&self) -> &FaultConfig {
        self.network.fault_config()
    }

    pub fn is_alive(&self, id: NodeId) -> Result<bool, SimulationError> {
        Ok(self.network.node(id)?.is_alive())
    }

    /// Marks a node failed. Messages it already sent stay scheduled; the
    /// delivery guard decides their fate when they come due.
    pub fn fail(&mut self, id: NodeId) -> Result<(), SimulationError> {
        self.network.node_mut(id)?.fail();
        tracing::debug!(time = self.now(), node = %id, "Node failed");
        Ok(())
    }

    pub fn recover(&mut self, id: NodeId) -> Result<(), SimulationError> {
        self.network.node_mut(id)?.recover();
        tracing::debug!(time = self.now(), node = %id, "Node recovered");
        Ok(())
    }

    /// Schedules `fail(id)` at virtual time `at`.
    pub fn schedule_failure(&mut self, id: NodeId, at: u64) -> Result<EventId, SimulationError> {
        self.network.node(id)?;
        Ok(self.scheduler.schedule_at(at, SimEvent::Fail(id))?)
    }

    /// Schedules `recover(id)` at virtual time `at`.
    pub fn schedule_recovery(&mut self, id: NodeId, at: u64) -> Result<EventId, SimulationError> {
        self.network.node(id)?;
        Ok(self.scheduler.schedule_at(at, SimEvent::Recover(id))?)
    }

    /// Schedules an arbitrary action at virtual time `at`.
    ///
    /// Rejected if `at` is earlier than the current time.
    pub fn schedule_at<F>(
        &mut self,
        at: u64,
        label: impl Into<String>,
        action: F,
    ) -> Result<EventId, SimulationError>
    where
        F: FnOnce(&mut Simulator<H>) -> Result<(), SimulationError> + 'static,
    {
        let event = SimEvent::Action {
            label: label.into(),
            action: Box::new(action),
        };
        Ok(self.scheduler.schedule_at(at, event)?)
    }

    /// Sends a message on behalf of `from`, outside of any handler.
    pub fn send_message(
        &mut self,
        from: NodeId,
        to: NodeId,
        message: Message,
    ) -> Result<Option<EventId>, SimulationError> {
        self.network.send(&mut self.scheduler, from, to, message)
    }

    /// Runs `f` with the handler of node `id` and a context acting as that
    /// node, e.g. to start a protocol operation from a driver event.
    pub fn with_node<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut H, &mut NodeContext<'_, H>) -> R,
    ) -> Result<R, SimulationError> {
        let Simulator {
            scheduler,
            network,
            handlers,
            ..
        } = self;
        let handler = handlers
            .get_mut(id.as_usize())
            .ok_or(SimulationError::UnknownNode(id))?;
        let mut ctx = NodeContext::new(id, scheduler, network);
        Ok(f(handler, &mut ctx))
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut Scheduler<SimEvent<H>> {
        &mut self.scheduler
    }

    fn record(&mut self, time: u64, event: EventId, kind: TraceKind) {
        self.trace.push(TraceEntry { time, event, kind });
    }
}

impl<H: MessageHandler> Simulator<H> {
    /// Executes the next event, if any.
    ///
    /// Returns false once the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        let Some(event) = self.scheduler.step() else {
            return Ok(false);
        };
        let now = event.timestamp;

        match event.payload {
            SimEvent::Deliver { from, to, message } => {
                match self.network.check_delivery(from, to, &message, now)? {
                    Some(reason) => {
                        let kind = TraceKind::Dropped {
                            from,
                            to,
                            message: message.id().clone(),
                            reason,
                        };
                        self.record(now, event.id, kind);
                    }
                    None => {
                        let kind = TraceKind::Delivered {
                            from,
                            to,
                            message: message.id().clone(),
                            kind: message.kind(),
                            sequence_number: message.sequence_number(),
                        };
                        self.record(now, event.id, kind);
                        self.dispatch(from, to, message, now)?;
                    }
                }
            }
            SimEvent::Fail(node) => {
                self.fail(node)?;
                self.record(now, event.id, TraceKind::Failed(node));
            }
            SimEvent::Recover(node) => {
                self.recover(node)?;
                self.record(now, event.id, TraceKind::Recovered(node));
            }
            SimEvent::Action { label, action } => {
                tracing::trace!(time = now, %label, "Running action");
                self.record(now, event.id, TraceKind::Action(label));
                action(self)?;
            }
        }
        Ok(true)
    }

    /// Runs until the event queue is exhausted.
    ///
    /// Stops at the first error; the failing event has already been removed
    /// from the queue.
    pub fn run(&mut self) -> Result<SimulationStats, SimulationError> {
        let start = self.scheduler.processed_count();
        while self.step()? {}
        let stats = SimulationStats {
            events_processed: self.scheduler.processed_count() - start,
            final_time: self.now(),
            network: self.network.stats().clone(),
        };
        tracing::info!(
            final_time = stats.final_time,
            events = stats.events_processed,
            delivered = stats.network.messages_delivered,
            "Simulation ended"
        );
        Ok(stats)
    }

    /// Executes every event due at or before `target`, then moves the clock
    /// to `target`.
    ///
    /// Returns the number of events executed.
    pub fn run_until_time(&mut self, target: u64) -> Result<usize, SimulationError> {
        let mut processed = 0;
        while self
            .scheduler
            .next_event_time()
            .is_some_and(|next| next <= target)
        {
            self.step()?;
            processed += 1;
        }
        if target > self.now() {
            self.scheduler.advance_to(target)?;
        }
        Ok(processed)
    }

    fn dispatch(
        &mut self,
        from: NodeId,
        to: NodeId,
        message: Message,
        now: u64,
    ) -> Result<(), SimulationError> {
        let Simulator {
            scheduler,
            network,
            handlers,
            ..
        } = self;
        let handler = handlers
            .get_mut(to.as_usize())
            .ok_or(SimulationError::UnknownNode(to))?;
        let mut ctx = NodeContext::new(to, scheduler, network);
        handler.receive_message(&mut ctx, from, message, now)
    }
}

impl<H> fmt::Debug for Simulator<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("scheduler", &self.scheduler)
            .field("network", &self.network)
            .field("trace_len", &self.trace.len())
            .finish()
    }
}
