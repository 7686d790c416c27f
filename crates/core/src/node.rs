//! Simulated participants and the protocol handler seam.
//!
//! A node is plain data owned by the network registry: an id, a name and a
//! liveness flag. Its behaviour is supplied by composition, through a
//! [`MessageHandler`] stored next to it in the [`Simulator`].
//!
//! [`Simulator`]: crate::simulation::Simulator

use std::fmt;

use crate::{
    message::Message,
    simulation::{EventId, Network, Scheduler, SimEvent, SimulationError, Timer},
};

/// Handle to a node in the simulator registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liveness {
    #[default]
    Alive,
    Failed,
}

/// Registry entry for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    id: NodeId,
    name: String,
    liveness: Liveness,
}

impl NodeInfo {
    pub(crate) fn new(id: NodeId, name: String) -> Self {
        Self {
            id,
            name,
            liveness: Liveness::Alive,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }

    pub(crate) fn fail(&mut self) {
        self.liveness = Liveness::Failed;
    }

    pub(crate) fn recover(&mut self) {
        self.liveness = Liveness::Alive;
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "Node-{}", self.id.0)
        } else {
            write!(f, "Node-{}", self.name)
        }
    }
}

/// Protocol logic run by a node when a message is delivered to it.
///
/// Every protocol variant implements this; the transport calls it only after
/// the delivery guard has passed.
pub trait MessageHandler: Sized {
    /// Handle `message` sent by `from`, delivered at virtual time `time`.
    ///
    /// Errors are configuration errors and abort the simulation run.
    fn receive_message(
        &mut self,
        ctx: &mut NodeContext<'_, Self>,
        from: NodeId,
        message: Message,
        time: u64,
    ) -> Result<(), SimulationError>;
}

/// What a handler can do while it runs: look at the clock and its own
/// liveness, send messages, and arm timers.
pub struct NodeContext<'a, H> {
    id: NodeId,
    scheduler: &'a mut Scheduler<SimEvent<H>>,
    network: &'a mut Network,
}

impl<'a, H> NodeContext<'a, H> {
    pub(crate) fn new(
        id: NodeId,
        scheduler: &'a mut Scheduler<SimEvent<H>>,
        network: &'a mut Network,
    ) -> Self {
        Self {
            id,
            scheduler,
            network,
        }
    }

    /// The node this context belongs to.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn is_alive(&self) -> bool {
        self.network
            .node(self.id)
            .map(NodeInfo::is_alive)
            .unwrap_or(false)
    }

    /// Sends `message` to `to` through the simulated network.
    ///
    /// Returns the delivery event, or None if the message was not put on the
    /// wire (this node is failed, or a fault dropped it).
    pub fn send_message(
        &mut self,
        to: NodeId,
        message: Message,
    ) -> Result<Option<EventId>, SimulationError> {
        self.network.send(self.scheduler, self.id, to, message)
    }

    /// Arms a one-shot timer relative to the current time.
    pub fn start_timer(&mut self, timer: Timer<H>) -> EventId {
        timer.schedule_on(self.scheduler)
    }
}

impl<H> fmt::Debug for NodeContext<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("id", &self.id)
            .field("now", &self.now())
            .finish()
    }
}
