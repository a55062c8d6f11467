//! Network events emitted by the Meshchat swarm.
//!
//! [`NetworkEvent`] is the unified event type that consumers receive
//! from the swarm event loop. All libp2p-specific events are mapped
//! into this enum before being delivered to higher layers; the node
//! orchestration translates them into the external JSON protocol.

use libp2p::{Multiaddr, PeerId};

/// Events emitted by the Meshchat network layer.
#[derive(Clone, Debug)]
pub enum NetworkEvent {
    /// The swarm bound a new listening address.
    NewListenAddr(Multiaddr),

    /// A connection to a remote peer was established.
    PeerConnected(PeerId),

    /// An outbound connection attempt failed.
    DialFailed {
        /// Target peer, if the dial was addressed to a known peer.
        peer_id: Option<PeerId>,
        /// Human-readable failure reason.
        error: String,
    },

    /// A provider lookup under the rendezvous key returned peers.
    ///
    /// May include the local peer and peers already seen; the
    /// consumer decides what to skip.
    PeersDiscovered(Vec<PeerId>),

    /// A chat message arrived on the gossip topic.
    ///
    /// Messages originating from the local node are filtered out
    /// before this event is emitted.
    ChatMessage {
        /// Peer that authored the message.
        source: PeerId,
        /// Raw payload bytes.
        data: Vec<u8>,
    },
}
