//! Federated swarm client: package local weight deltas, scrub and noise
//! them, and exchange them with the swarm aggregator on a configurable
//! schedule.

pub mod client;
pub mod packet;

pub use client::{default_queue_path, QueuedUpload, ScheduleState, SwarmClient};
pub use packet::{
    add_noise, checksum, package, scrub_packet, verify_checksum, WeightCategory, DeltaPacket,
    SignedPacket, WeightPacket, ALL_CATEGORIES,
};
