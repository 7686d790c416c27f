use thiserror::Error;

use super::scheduler::ScheduleError;
use crate::{config::ConfigError, node::NodeId};

/// Errors that abort a simulation.
///
/// These are configuration or programming errors. Expected network behaviour
/// (failed senders, dropped messages, protocol anomalies) is never reported
/// through this type.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("scheduling error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
