//! Node identity creation.
//!
//! A Meshchat node identity is an ephemeral ed25519 keypair generated
//! once at startup. It is never persisted; the derived `PeerId` is the
//! node's globally unique identifier for the lifetime of the process
//! and is announced in the `started` event.

use libp2p::identity;
use libp2p::PeerId;

/// Generates a fresh ed25519 node identity.
pub fn generate() -> identity::Keypair {
    identity::Keypair::generate_ed25519()
}

/// Derives the `PeerId` for a keypair.
pub fn peer_id_of(keypair: &identity::Keypair) -> PeerId {
    PeerId::from(keypair.public())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
