//! Sequencer-based total-order multicast.
//!
//! One member of the group is the sequencer. Senders hand unsequenced
//! messages to it; it stamps each with the next sequence number in arrival
//! order and relays the stamped copy to every member, itself included. Each
//! member buffers stamped messages and delivers them strictly in sequence
//! order, so all members that stay reachable deliver the same sequence.
//!
//! There is no retransmission: a stamped message that never reaches a member
//! leaves a permanent gap there, and that member stops delivering at the gap.

use std::collections::{BTreeMap, HashSet};

use crate::{
    message::{Message, MessageId, MessageKind},
    node::{MessageHandler, NodeContext, NodeId},
    simulation::{EventId, SimulationError, Simulator},
};

/// Reorders stamped messages into contiguous sequence-number order.
#[derive(Debug, Default, Clone)]
pub struct DeliveryQueue {
    next_expected: u64,
    pending: BTreeMap<u64, Message>,
    delivered_ids: HashSet<MessageId>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a stamped message; returns the messages that became
    /// deliverable, in sequence order.
    ///
    /// Unstamped messages and sequence numbers already consumed or buffered
    /// are ignored. Every other slot is buffered; a slot carrying an
    /// already-delivered id is consumed without delivering anything.
    pub fn offer(&mut self, message: Message) -> Vec<Message> {
        let Some(seq) = message.sequence_number() else {
            return Vec::new();
        };
        if seq < self.next_expected || self.pending.contains_key(&seq) {
            tracing::trace!(seq, id = %message.id(), "Ignoring duplicate");
            return Vec::new();
        }
        self.pending.insert(seq, message);

        let mut ready = Vec::new();
        while let Some(next) = self.pending.remove(&self.next_expected) {
            self.next_expected += 1;
            if self.delivered_ids.insert(next.id().clone()) {
                ready.push(next);
            }
        }
        ready
    }

    /// The sequence number the next delivery must carry.
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// Number of messages held back behind a gap.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn has_delivered(&self, id: &MessageId) -> bool {
        self.delivered_ids.contains(id)
    }
}

/// A message handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub time: u64,
    pub message_id: MessageId,
    pub sequence_number: u64,
    pub payload: Option<String>,
}

/// Group member running the sequencer protocol.
#[derive(Debug, Clone)]
pub struct SequencerMulticast {
    sequencer: NodeId,
    group: Vec<NodeId>,
    /// Only advanced on the sequencer.
    next_assignable_sequence: u64,
    queue: DeliveryQueue,
    delivered: Vec<Delivery>,
}

impl SequencerMulticast {
    /// A member of `group`, with `sequencer` assigning the order.
    pub fn new(sequencer: NodeId, group: Vec<NodeId>) -> Self {
        Self {
            sequencer,
            group,
            next_assignable_sequence: 0,
            queue: DeliveryQueue::new(),
            delivered: Vec::new(),
        }
    }

    pub fn sequencer(&self) -> NodeId {
        self.sequencer
    }

    pub fn group(&self) -> &[NodeId] {
        &self.group
    }

    /// Delivered messages, in delivery order.
    pub fn delivered(&self) -> &[Delivery] {
        &self.delivered
    }

    /// Ids of delivered messages, in delivery order.
    pub fn delivered_ids(&self) -> impl Iterator<Item = &MessageId> + '_ {
        self.delivered.iter().map(|d| &d.message_id)
    }

    pub fn next_expected_sequence(&self) -> u64 {
        self.queue.next_expected()
    }

    pub fn buffered(&self) -> usize {
        self.queue.buffered()
    }

    /// Multicasts `payload` to the group by handing it to the sequencer.
    ///
    /// The sequencer uses this same path for its own messages.
    pub fn send_multicast(
        &mut self,
        ctx: &mut NodeContext<'_, Self>,
        message_id: impl Into<MessageId>,
        payload: impl Into<String>,
    ) -> Result<Option<EventId>, SimulationError> {
        let message = Message::new(message_id, ctx.id(), self.sequencer, MessageKind::Multicast)
            .with_payload(payload);
        tracing::debug!(
            time = ctx.now(),
            node = %ctx.id(),
            id = %message.id(),
            "Sending multicast"
        );
        ctx.send_message(self.sequencer, message)
    }

    fn sequence_and_relay(
        &mut self,
        ctx: &mut NodeContext<'_, Self>,
        message: Message,
    ) -> Result<(), SimulationError> {
        let seq = self.next_assignable_sequence;
        self.next_assignable_sequence += 1;
        let stamped = message.with_sequence_number(seq);
        tracing::debug!(time = ctx.now(), id = %stamped.id(), seq, "Assigned sequence number");

        for &member in &self.group {
            ctx.send_message(member, stamped.clone())?;
        }
        Ok(())
    }

    fn deliver(&mut self, message: Message, time: u64, node: NodeId) {
        for ready in self.queue.offer(message) {
            let sequence_number = ready.sequence_number().unwrap_or_default();
            tracing::debug!(time, %node, id = %ready.id(), seq = sequence_number, "Delivered");
            self.delivered.push(Delivery {
                time,
                message_id: ready.id().clone(),
                sequence_number,
                payload: ready.payload().map(str::to_owned),
            });
        }
    }
}

impl MessageHandler for SequencerMulticast {
    fn receive_message(
        &mut self,
        ctx: &mut NodeContext<'_, Self>,
        from: NodeId,
        message: Message,
        time: u64,
    ) -> Result<(), SimulationError> {
        if message.kind() != MessageKind::Multicast {
            tracing::warn!(
                time,
                node = %ctx.id(),
                %from,
                kind = %message.kind(),
                "Ignoring non-multicast message"
            );
            return Ok(());
        }

        match message.sequence_number() {
            None if ctx.id() == self.sequencer => self.sequence_and_relay(ctx, message),
            None => {
                // Misrouted: only the sequencer may assign an order.
                tracing::debug!(
                    time,
                    node = %ctx.id(),
                    id = %message.id(),
                    "Forwarding to sequencer"
                );
                ctx.send_message(self.sequencer, message)?;
                Ok(())
            }
            Some(_) if from == self.sequencer => {
                self.deliver(message, time, ctx.id());
                Ok(())
            }
            Some(seq) => {
                tracing::warn!(
                    time,
                    node = %ctx.id(),
                    %from,
                    seq,
                    "Ignoring sequenced message not sent by the sequencer"
                );
                Ok(())
            }
        }
    }
}

/// Adds `size` members to `sim`, the first of them acting as sequencer.
pub fn build_group(sim: &mut Simulator<SequencerMulticast>, size: usize) -> Vec<NodeId> {
    let first = sim.node_count();
    let group: Vec<NodeId> = (first..first + size).map(NodeId::new).collect();
    let Some(&sequencer) = group.first() else {
        return group;
    };
    for &id in &group {
        let member = SequencerMulticast::new(sequencer, group.clone());
        let added = sim.add_node(id.as_usize().to_string(), member);
        debug_assert_eq!(added, id);
    }
    group
}

/// Schedules `node` to multicast `payload` at virtual time `at`.
pub fn schedule_multicast(
    sim: &mut Simulator<SequencerMulticast>,
    at: u64,
    node: NodeId,
    message_id: impl Into<MessageId>,
    payload: impl Into<String>,
) -> Result<EventId, SimulationError> {
    let message_id = message_id.into();
    let payload = payload.into();
    sim.node(node)?;
    let label = format!("multicast {message_id} from {node}");
    sim.schedule_at(at, label, move |sim| {
        sim.with_node(node, |member, ctx| member.send_multicast(ctx, message_id, payload))??;
        Ok(())
    })
}
