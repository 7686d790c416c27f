//! Protocol handlers that run on top of the simulator.

mod ping_pong;
pub mod sequencer;

pub use ping_pong::{PingPong, Receipt};
pub use sequencer::{build_group, schedule_multicast, Delivery, DeliveryQueue, SequencerMulticast};
