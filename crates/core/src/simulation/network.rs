//! Simulated network layer with deterministic message delivery.
//!
//! Every send draws an independent delay from the injected random source and
//! becomes a delivery event on the scheduler. Liveness is checked twice: the
//! sender at send time, and again (per [`DeliveryGuard`]) at delivery time.

use super::{
    errors::SimulationError,
    fault::FaultConfig,
    rng::RandomSource,
    runner::SimEvent,
    scheduler::{EventId, Scheduler},
};
use crate::{
    config::{DeliveryGuard, SimulatorConfig},
    message::Message,
    node::{NodeId, NodeInfo},
};

/// Why a scheduled delivery did not reach the destination handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sender failed after sending, before the delivery time.
    SenderFailed,
    /// The destination was failed at delivery time (only with
    /// [`DeliveryGuard::SenderAndDestination`]).
    DestinationFailed,
}

/// Statistics about the simulated network.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetworkStats {
    /// Send requests, including those that never hit the wire
    pub messages_sent: u64,
    /// Messages handed to a destination handler
    pub messages_delivered: u64,
    /// Sends ignored because the sender was failed
    pub sends_from_failed: u64,
    /// In-flight messages dropped at delivery time
    pub messages_dropped: u64,
    /// Messages lost by random fault injection
    pub messages_lost: u64,
    /// Messages blocked by a partition
    pub messages_partitioned: u64,
    /// Sum of all drawn delays (ticks)
    pub total_latency: u64,
}

impl NetworkStats {
    /// Messages that were scheduled for delivery.
    pub fn messages_scheduled(&self) -> u64 {
        self.messages_sent - self.sends_from_failed - self.messages_lost - self.messages_partitioned
    }

    /// Returns the average drawn delay per scheduled message.
    pub fn average_latency(&self) -> u64 {
        match self.messages_scheduled() {
            0 => 0,
            n => self.total_latency / n,
        }
    }
}

/// The node registry plus everything a send needs: delay generator, fault
/// layer and counters.
pub struct Network {
    config: SimulatorConfig,
    rng: Box<dyn RandomSource>,
    nodes: Vec<NodeInfo>,
    faults: FaultConfig,
    stats: NetworkStats,
}

impl Network {
    pub(crate) fn new(config: SimulatorConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            config,
            rng,
            nodes: Vec::new(),
            faults: FaultConfig::default(),
            stats: NetworkStats::default(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn fault_config(&self) -> &FaultConfig {
        &self.faults
    }

    pub(crate) fn set_fault_config(&mut self, faults: FaultConfig) {
        self.faults = faults;
    }

    pub(crate) fn register(&mut self, name: String) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeInfo::new(id, name));
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeInfo, SimulationError> {
        self.nodes
            .get(id.as_usize())
            .ok_or(SimulationError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeInfo, SimulationError> {
        self.nodes
            .get_mut(id.as_usize())
            .ok_or(SimulationError::UnknownNode(id))
    }

    /// Puts `message` on the wire from `from` to `to`.
    ///
    /// Returns the delivery event ID, or None if the sender is failed or a
    /// fault dropped the message. Neither case is an error.
    pub(crate) fn send<H>(
        &mut self,
        scheduler: &mut Scheduler<SimEvent<H>>,
        from: NodeId,
        to: NodeId,
        message: Message,
    ) -> Result<Option<EventId>, SimulationError> {
        self.node(to)?;
        let sender_alive = self.node(from)?.is_alive();
        let now = scheduler.now();
        self.stats.messages_sent += 1;

        if !sender_alive {
            tracing::trace!(%from, %to, id = %message.id(), "Send ignored: sender failed");
            self.stats.sends_from_failed += 1;
            return Ok(None);
        }

        self.faults.cleanup_healed_partitions(now);
        if self.faults.is_partitioned(from, to, now) {
            tracing::trace!(%from, %to, id = %message.id(), "Message dropped: network partition");
            self.stats.messages_partitioned += 1;
            return Ok(None);
        }

        if self.faults.should_drop_message(self.rng.as_mut()) {
            tracing::trace!(%from, %to, id = %message.id(), "Message dropped: random loss");
            self.stats.messages_lost += 1;
            return Ok(None);
        }

        let delay = self.rng.delay(self.config.max_latency);
        self.stats.total_latency += delay;

        if self.config.debug {
            tracing::debug!(
                time = now,
                %from,
                %to,
                delay,
                message = %message,
                "Sending message"
            );
        }

        let event_id = scheduler.schedule_after(delay, SimEvent::Deliver { from, to, message });
        Ok(Some(event_id))
    }

    /// Runs the delivery guard for a message whose delivery time has come.
    ///
    /// Returns None if the message may be handed to the destination.
    pub(crate) fn check_delivery(
        &mut self,
        from: NodeId,
        to: NodeId,
        message: &Message,
        now: u64,
    ) -> Result<Option<DropReason>, SimulationError> {
        let reason = if !self.node(from)?.is_alive() {
            Some(DropReason::SenderFailed)
        } else if self.config.delivery_guard == DeliveryGuard::SenderAndDestination
            && !self.node(to)?.is_alive()
        {
            Some(DropReason::DestinationFailed)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::trace!(
                    time = now,
                    %from,
                    %to,
                    id = %message.id(),
                    ?reason,
                    "Delivery dropped"
                );
                self.stats.messages_dropped += 1;
            }
            None => {
                if self.config.debug {
                    tracing::debug!(time = now, %from, %to, message = %message, "Received message");
                }
                self.stats.messages_delivered += 1;
            }
        }
        Ok(reason)
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.nodes.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{message::MessageKind, simulation::rng::ScriptedDelays};

    type TestScheduler = Scheduler<SimEvent<()>>;

    fn network(delays: impl IntoIterator<Item = u64>, config: SimulatorConfig) -> Network {
        let mut net = Network::new(config, Box::new(ScriptedDelays::new(delays)));
        net.register("a".into());
        net.register("b".into());
        net
    }

    fn ping(from: usize, to: usize) -> Message {
        Message::new(1u64, NodeId::new(from), NodeId::new(to), MessageKind::Ping)
    }

    fn a() -> NodeId {
        NodeId::new(0)
    }

    fn b() -> NodeId {
        NodeId::new(1)
    }

    #[test]
    fn test_send_schedules_after_drawn_delay() {
        let mut scheduler = TestScheduler::new();
        let mut net = network([42], SimulatorConfig::default());

        let id = net.send(&mut scheduler, a(), b(), ping(0, 1)).unwrap();
        assert!(id.is_some());
        assert_eq!(scheduler.next_event_time(), Some(42));
        assert_eq!(net.stats().total_latency, 42);
    }

    #[test]
    fn test_send_from_failed_is_noop() {
        let mut scheduler = TestScheduler::new();
        let mut net = network([42], SimulatorConfig::default());
        net.node_mut(a()).unwrap().fail();

        assert_eq!(net.send(&mut scheduler, a(), b(), ping(0, 1)).unwrap(), None);
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(net.stats().sends_from_failed, 1);
        assert_eq!(net.stats().messages_scheduled(), 0);
    }

    #[test]
    fn test_send_to_unknown_node_is_error() {
        let mut scheduler = TestScheduler::new();
        let mut net = network([], SimulatorConfig::default());

        let err = net
            .send(&mut scheduler, a(), NodeId::new(9), ping(0, 9))
            .unwrap_err();
        assert!(matches!(err, SimulationError::UnknownNode(id) if id == NodeId::new(9)));
    }

    #[test]
    fn test_delay_respects_max_latency() {
        let mut scheduler = TestScheduler::new();
        let mut net = network([500], SimulatorConfig::default().with_max_latency(20));

        net.send(&mut scheduler, a(), b(), ping(0, 1)).unwrap();
        assert_eq!(scheduler.next_event_time(), Some(20));
    }

    #[test]
    fn test_guard_checks_sender_only_by_default() {
        let mut net = network([], SimulatorConfig::default());
        net.node_mut(b()).unwrap().fail();
        assert_eq!(net.check_delivery(a(), b(), &ping(0, 1), 5).unwrap(), None);

        net.node_mut(a()).unwrap().fail();
        assert_eq!(
            net.check_delivery(a(), b(), &ping(0, 1), 5).unwrap(),
            Some(DropReason::SenderFailed)
        );
        assert_eq!(net.stats().messages_delivered, 1);
        assert_eq!(net.stats().messages_dropped, 1);
    }

    #[test]
    fn test_guard_with_destination_check() {
        let config =
            SimulatorConfig::default().with_delivery_guard(DeliveryGuard::SenderAndDestination);
        let mut net = network([], config);
        net.node_mut(b()).unwrap().fail();

        assert_eq!(
            net.check_delivery(a(), b(), &ping(0, 1), 5).unwrap(),
            Some(DropReason::DestinationFailed)
        );
    }

    #[test]
    fn test_partition_blocks_at_send_time() {
        use crate::simulation::fault::Partition;

        let mut scheduler = TestScheduler::new();
        let mut net = network([10], SimulatorConfig::default());
        net.set_fault_config(
            FaultConfig::builder()
                .partition(Partition::new([a()], [b()]).with_duration(0, 5))
                .build(),
        );

        assert_eq!(net.send(&mut scheduler, a(), b(), ping(0, 1)).unwrap(), None);
        assert_eq!(net.stats().messages_partitioned, 1);
        // No delay was drawn for the blocked message
        net.send(&mut scheduler, a(), a(), ping(0, 0)).unwrap();
        assert_eq!(scheduler.next_event_time(), Some(10));
    }

    #[test]
    fn test_healed_partitions_are_pruned_on_send() {
        use crate::simulation::fault::Partition;

        let mut scheduler = TestScheduler::new();
        let mut net = network([10, 10], SimulatorConfig::default());
        net.set_fault_config(
            FaultConfig::builder()
                .partition(Partition::new([a()], [b()]).with_duration(0, 5))
                .partition(Partition::new([a()], [b()]).permanent(100))
                .build(),
        );

        scheduler.advance_to(20).unwrap();
        let id = net.send(&mut scheduler, a(), b(), ping(0, 1)).unwrap();

        assert!(id.is_some());
        assert_eq!(net.fault_config().partitions.len(), 1);
        assert_eq!(net.fault_config().partitions[0].start_time, 100);
    }

    #[test]
    fn test_total_loss() {
        let mut scheduler = TestScheduler::new();
        let mut net = network([10], SimulatorConfig::default());
        net.set_fault_config(FaultConfig::builder().message_loss_rate(1.0).build());

        assert_eq!(net.send(&mut scheduler, a(), b(), ping(0, 1)).unwrap(), None);
        assert_eq!(net.stats().messages_lost, 1);
        assert_eq!(net.stats().average_latency(), 0);
    }
}
