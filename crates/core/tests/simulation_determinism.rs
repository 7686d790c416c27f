//! Deterministic replay: identical seeds and call sequences give identical
//! execution traces.

use testresult::TestResult;
use vsim::{
    config::SimulatorConfig,
    protocol::{build_group, schedule_multicast},
    simulation::{
        FaultConfig, SimulationError, SimulationRng, Simulator, Timer, TraceEntry, TraceKind,
    },
    Message, MessageHandler, MessageKind, NodeContext, NodeId,
};

fn multicast_trace(seed: u64, faults: FaultConfig) -> TestResult<Vec<TraceEntry>> {
    let mut sim = Simulator::new(SimulatorConfig::default().with_seed(seed))?;
    let group = build_group(&mut sim, 5);
    sim.set_fault_config(faults)?;
    for (round, at) in [10, 20, 30].into_iter().enumerate() {
        schedule_multicast(&mut sim, at, group[1], format!("A{round}"), "a")?;
        schedule_multicast(&mut sim, at, group[2], format!("B{round}"), "b")?;
    }
    sim.run()?;
    Ok(sim.trace().to_vec())
}

#[test_log::test]
fn same_seed_same_trace() -> TestResult {
    let first = multicast_trace(1233, FaultConfig::default())?;
    let second = multicast_trace(1233, FaultConfig::default())?;
    assert!(!first.is_empty());
    assert_eq!(first, second);
    Ok(())
}

#[test_log::test]
fn different_seed_different_trace() -> TestResult {
    assert_ne!(
        multicast_trace(1, FaultConfig::default())?,
        multicast_trace(2, FaultConfig::default())?
    );
    Ok(())
}

#[test_log::test]
fn message_loss_is_reproducible() -> TestResult {
    let lossy = || FaultConfig::builder().message_loss_rate(0.3).build();
    assert_eq!(multicast_trace(42, lossy())?, multicast_trace(42, lossy())?);
    Ok(())
}

#[test_log::test]
fn trace_is_time_ordered() -> TestResult {
    let trace = multicast_trace(5, FaultConfig::default())?;
    assert!(trace.windows(2).all(|w| w[0].time <= w[1].time));
    Ok(())
}

#[test]
fn rng_same_seed_produces_same_sequence() {
    let mut rng1 = SimulationRng::new(0xDEADBEEF);
    let mut rng2 = SimulationRng::new(0xDEADBEEF);
    for _ in 0..100 {
        assert_eq!(rng1.gen_u64(), rng2.gen_u64());
    }
}

/// Echoes every ping back after a fixed think time armed as a timer.
#[derive(Debug, Default)]
struct DelayedEcho {
    echoed_at: Vec<u64>,
}

const THINK_TIME: u64 = 7;

impl MessageHandler for DelayedEcho {
    fn receive_message(
        &mut self,
        ctx: &mut NodeContext<'_, Self>,
        from: NodeId,
        message: Message,
        _time: u64,
    ) -> Result<(), SimulationError> {
        if message.kind() != MessageKind::Ping {
            return Ok(());
        }
        let me = ctx.id();
        ctx.start_timer(Timer::new(THINK_TIME, move |sim: &mut Simulator<DelayedEcho>| {
            let now = sim.now();
            sim.handler_mut(me)?.echoed_at.push(now);
            let pong = Message::new(message.id().clone(), me, from, MessageKind::Pong);
            sim.send_message(me, from, pong)?;
            Ok(())
        }));
        Ok(())
    }
}

fn echo_trace(seed: u64) -> TestResult<(Vec<TraceEntry>, Vec<u64>)> {
    let mut sim = Simulator::new(SimulatorConfig::default().with_seed(seed))?;
    let client = sim.add_node("client", DelayedEcho::default());
    let server = sim.add_node("server", DelayedEcho::default());

    for (i, at) in [0, 5, 5, 40].into_iter().enumerate() {
        sim.schedule_at(at, format!("ping {i}"), move |sim| {
            let ping = Message::new(i as u64, client, server, MessageKind::Ping);
            sim.send_message(client, server, ping)?;
            Ok(())
        })?;
    }
    sim.run()?;

    let echoed = sim.handler(server)?.echoed_at.clone();
    Ok((sim.trace().to_vec(), echoed))
}

#[test_log::test]
fn timers_armed_by_handlers_replay_identically() -> TestResult {
    let (trace1, echoed1) = echo_trace(77)?;
    let (trace2, echoed2) = echo_trace(77)?;
    assert_eq!(trace1, trace2);
    assert_eq!(echoed1, echoed2);
    assert_eq!(echoed1.len(), 4);

    // Each echo fires THINK_TIME after the ping it answers was delivered.
    let ping_deliveries: Vec<u64> = trace1
        .iter()
        .filter(|e| matches!(e.kind, TraceKind::Delivered { kind: MessageKind::Ping, .. }))
        .map(|e| e.time + THINK_TIME)
        .collect();
    let mut expected = ping_deliveries;
    expected.sort_unstable();
    let mut actual = echoed1;
    actual.sort_unstable();
    assert_eq!(actual, expected);
    Ok(())
}
