//! Request/response liveness probe.

use crate::{
    message::{Message, MessageId, MessageKind},
    node::{MessageHandler, NodeContext, NodeId},
    simulation::{EventId, SimulationError},
};

/// A message observed by a [`PingPong`] node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub time: u64,
    pub from: NodeId,
    pub kind: MessageKind,
    pub message_id: MessageId,
}

/// Answers every `PING` with a `PONG` carrying the same message id.
#[derive(Debug, Default, Clone)]
pub struct PingPong {
    received: Vec<Receipt>,
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything this node received, in delivery order.
    pub fn received(&self) -> &[Receipt] {
        &self.received
    }

    /// Sends a `PING` to `to`.
    pub fn ping(
        &self,
        ctx: &mut NodeContext<'_, Self>,
        to: NodeId,
        id: impl Into<MessageId>,
    ) -> Result<Option<EventId>, SimulationError> {
        let message = Message::new(id, ctx.id(), to, MessageKind::Ping);
        tracing::debug!(time = ctx.now(), from = %ctx.id(), %to, "Sending PING");
        ctx.send_message(to, message)
    }
}

impl MessageHandler for PingPong {
    fn receive_message(
        &mut self,
        ctx: &mut NodeContext<'_, Self>,
        from: NodeId,
        message: Message,
        time: u64,
    ) -> Result<(), SimulationError> {
        self.received.push(Receipt {
            time,
            from,
            kind: message.kind(),
            message_id: message.id().clone(),
        });

        match message.kind() {
            MessageKind::Ping => {
                tracing::debug!(time, node = %ctx.id(), %from, "Received PING, sending PONG");
                let pong = Message::new(
                    message.id().clone(),
                    ctx.id(),
                    message.src(),
                    MessageKind::Pong,
                );
                ctx.send_message(from, pong)?;
            }
            MessageKind::Pong => {
                tracing::debug!(time, node = %ctx.id(), %from, "Received PONG");
            }
            MessageKind::Multicast => {
                tracing::warn!(
                    time,
                    node = %ctx.id(),
                    %from,
                    id = %message.id(),
                    "Ignoring multicast message"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimulatorConfig,
        simulation::{ScriptedDelays, Simulator},
    };

    #[test]
    fn test_ping_gets_pong() {
        let mut sim =
            Simulator::with_random_source(SimulatorConfig::default(), ScriptedDelays::new([12, 30]))
                .unwrap();
        let host1 = sim.add_node("1", PingPong::new());
        let host2 = sim.add_node("2", PingPong::new());

        sim.with_node(host1, |node, ctx| node.ping(ctx, host2, 1u64))
            .unwrap()
            .unwrap();
        sim.run().unwrap();

        assert_eq!(
            sim.handler(host2).unwrap().received(),
            &[Receipt {
                time: 12,
                from: host1,
                kind: MessageKind::Ping,
                message_id: 1u64.into(),
            }]
        );
        assert_eq!(
            sim.handler(host1).unwrap().received(),
            &[Receipt {
                time: 42,
                from: host2,
                kind: MessageKind::Pong,
                message_id: 1u64.into(),
            }]
        );
    }

    #[test]
    fn test_pong_is_not_answered() {
        let mut sim =
            Simulator::with_random_source(SimulatorConfig::default(), ScriptedDelays::new([5]))
                .unwrap();
        let a = sim.add_node("a", PingPong::new());
        let b = sim.add_node("b", PingPong::new());

        sim.send_message(a, b, Message::new(9u64, a, b, MessageKind::Pong))
            .unwrap();
        let stats = sim.run().unwrap();

        assert_eq!(stats.events_processed, 1);
        assert!(sim.handler(a).unwrap().received().is_empty());
    }
}
