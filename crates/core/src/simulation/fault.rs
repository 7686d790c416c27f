//! Fault injection configuration for simulation testing.
//!
//! Node crashes are modelled by node liveness (`fail`/`recover`). This module
//! adds the faults that act on individual messages:
//! - Message loss (random drops)
//! - Network partitions between sets of nodes

use std::collections::BTreeSet;

use super::rng::RandomSource;
use crate::{config::ConfigError, node::NodeId};

/// A network partition between sets of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// One side of the partition
    pub side_a: BTreeSet<NodeId>,
    /// Other side of the partition
    pub side_b: BTreeSet<NodeId>,
    /// When the partition starts (virtual ticks)
    pub start_time: u64,
    /// When the partition heals (virtual ticks), None for permanent
    pub heal_time: Option<u64>,
}

impl Partition {
    /// Creates a new permanent partition between two sets of nodes.
    pub fn new(
        side_a: impl IntoIterator<Item = NodeId>,
        side_b: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            side_a: side_a.into_iter().collect(),
            side_b: side_b.into_iter().collect(),
            start_time: 0,
            heal_time: None,
        }
    }

    /// Makes the partition active for `duration` ticks starting at `start_time`.
    pub fn with_duration(mut self, start_time: u64, duration: u64) -> Self {
        self.start_time = start_time;
        self.heal_time = Some(start_time.saturating_add(duration));
        self
    }

    /// Makes the partition permanent from `start_time` on.
    pub fn permanent(mut self, start_time: u64) -> Self {
        self.start_time = start_time;
        self.heal_time = None;
        self
    }

    /// Checks if this partition blocks `from -> to` at the given time.
    pub fn blocks(&self, from: NodeId, to: NodeId, current_time: u64) -> bool {
        if current_time < self.start_time || self.is_healed(current_time) {
            return false;
        }

        (self.side_a.contains(&from) && self.side_b.contains(&to))
            || (self.side_b.contains(&from) && self.side_a.contains(&to))
    }

    /// Returns true if this partition has healed by the given time.
    pub fn is_healed(&self, current_time: u64) -> bool {
        self.heal_time
            .is_some_and(|heal_time| current_time >= heal_time)
    }
}

/// Message-level faults applied by the simulated network at send time.
///
/// The default injects nothing and draws nothing from the random source, so
/// enabling the fault layer never shifts delay draws of a fault-free run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultConfig {
    /// Probability of dropping a message (0.0 to 1.0)
    pub message_loss_rate: f64,
    /// Active network partitions
    pub partitions: Vec<Partition>,
}

impl FaultConfig {
    /// Creates a new empty fault configuration (no faults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for fluent configuration.
    pub fn builder() -> FaultConfigBuilder {
        FaultConfigBuilder::new()
    }

    /// Rejects a loss rate outside `0.0..=1.0`, which the public field allows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.message_loss_rate) {
            return Err(ConfigError::LossRate(self.message_loss_rate));
        }
        Ok(())
    }

    /// Returns true if a message should be dropped.
    pub fn should_drop_message(&self, rng: &mut dyn RandomSource) -> bool {
        self.message_loss_rate > 0.0 && rng.chance(self.message_loss_rate)
    }

    /// Checks if communication between two nodes is blocked by a partition.
    pub fn is_partitioned(&self, from: NodeId, to: NodeId, current_time: u64) -> bool {
        self.partitions
            .iter()
            .any(|p| p.blocks(from, to, current_time))
    }

    /// Removes healed partitions.
    pub fn cleanup_healed_partitions(&mut self, current_time: u64) {
        self.partitions.retain(|p| !p.is_healed(current_time));
    }
}

/// Builder for creating FaultConfig with fluent API.
#[derive(Debug, Default)]
pub struct FaultConfigBuilder {
    config: FaultConfig,
}

impl FaultConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message loss rate, clamped to 0.0..=1.0.
    pub fn message_loss_rate(mut self, rate: f64) -> Self {
        self.config.message_loss_rate = if rate.is_nan() {
            0.0
        } else {
            rate.clamp(0.0, 1.0)
        };
        self
    }

    /// Adds a network partition.
    pub fn partition(mut self, partition: Partition) -> Self {
        self.config.partitions.push(partition);
        self
    }

    pub fn build(self) -> FaultConfig {
        self.config
    }
}
