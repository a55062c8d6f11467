//! Transport configuration for the Meshchat network layer.
//!
//! # Transport Architecture
//!
//! Meshchat uses a dual-stack transport plus relay fallback:
//!
//! - **QUIC** — Primary transport. Provides built-in encryption
//!   (TLS 1.3) and multiplexing without requiring Noise or Yamux.
//! - **TCP + Noise + Yamux** — Fallback transport for environments
//!   where UDP/QUIC is blocked.
//! - **Relay client** — Circuit Relay v2 client transport so peers
//!   behind NATs stay reachable; DCUtR upgrades relayed connections
//!   to direct ones when hole punching succeeds.
//!
//! Transport construction is integrated into the type-safe
//! [`libp2p::SwarmBuilder`] pipeline; the actual setup lives in
//! [`crate::swarm::MeshchatSwarm::new`]:
//!
//! ```text
//! SwarmBuilder::with_existing_identity(keypair)
//!     .with_tokio()
//!     .with_tcp(tcp::Config, noise::Config::new, yamux::Config::default)?
//!     .with_quic()
//!     .with_dns()?
//!     .with_relay_client(noise::Config::new, yamux::Config::default)?
//!     .with_behaviour(|key, relay_client| { ... })?
//!     .build()
//! ```
//!
//! This module provides the transport configuration used by the
//! swarm builder.

/// Returns the TCP configuration used by the swarm builder.
///
/// Nagle's algorithm is disabled (`nodelay`) for lower latency on
/// the small control-plane messages this node exchanges.
pub fn tcp_config() -> libp2p::tcp::Config {
    libp2p::tcp::Config::default().nodelay(true)
}
