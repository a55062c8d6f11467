//! Meshchat libp2p network layer.
//!
//! Provides identity creation, transport configuration, DHT-based
//! peer discovery, gossip pub/sub, and swarm orchestration for the
//! Meshchat chat overlay.
//!
//! # Architecture
//!
//! - [`identity`] — Ephemeral ed25519 node identities
//! - [`transport`] — QUIC + TCP transport with Noise encryption
//! - [`discovery`] — Kademlia DHT + Identify behaviour
//! - [`gossip`] — Gossipsub chat topic
//! - [`swarm`] — High-level swarm wrapper with event loop
//! - [`events`] — Unified [`events::NetworkEvent`] surface
//! - [`config`] — Network configuration with defaults

pub mod config;
pub mod discovery;
pub mod events;
pub mod gossip;
pub mod identity;
pub mod swarm;
pub mod transport;
