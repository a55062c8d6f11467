//! DHT-based peer discovery for the Meshchat overlay.
//!
//! Wraps Kademlia and Identify into a single [`NetworkBehaviour`] that
//! provides:
//!
//! - **Advertise** — announce this node as a provider of the fixed
//!   rendezvous key so other participants can find it.
//! - **Peer lookup** — query the DHT for other providers of the same
//!   rendezvous key.
//! - **Bootstrap** — seed the Kademlia routing table with the
//!   well-known seed peers.
//! - **Identify** — exchange peer metadata (listen addresses,
//!   protocol versions) on every new connection, which Kademlia uses
//!   to populate its routing table.

use std::time::Duration;

use libp2p::kad;
use libp2p::swarm::NetworkBehaviour;
use libp2p::{identify, identity, Multiaddr, PeerId, StreamProtocol};

use meshchat_types::MeshchatError;

use crate::config::{NetworkConfig, RENDEZVOUS_KEY};

/// Local alias so we never shadow `std::result::Result` (which the
/// `#[derive(NetworkBehaviour)]` macro needs).
type MResult<T> = std::result::Result<T, MeshchatError>;

// ---------------------------------------------------------------------------
// Combined NetworkBehaviour
// ---------------------------------------------------------------------------

/// Combined network behaviour providing Kademlia DHT and Identify.
///
/// The `NetworkBehaviour` derive macro auto-generates a
/// `DiscoveryBehaviourEvent` enum with one variant per field.
#[derive(NetworkBehaviour)]
pub struct DiscoveryBehaviour {
    /// Kademlia DHT for provider records and peer routing.
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,

    /// Identify protocol — exchanges peer info (addresses, protocols)
    /// on every new connection.
    pub identify: identify::Behaviour,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Builds a [`DiscoveryBehaviour`] from the given identity and config.
///
/// # Errors
///
/// Returns `MeshchatError::NetworkError` if the configured Kademlia
/// protocol name is invalid.
pub fn build_discovery_behaviour(
    keypair: &identity::Keypair,
    config: &NetworkConfig,
) -> MResult<DiscoveryBehaviour> {
    // --- Kademlia -----------------------------------------------------------

    let local_peer_id = PeerId::from(keypair.public());

    let protocol = StreamProtocol::try_from_owned(config.kad_protocol.clone()).map_err(
        |e| MeshchatError::NetworkError {
            reason: format!("invalid Kademlia protocol name '{}': {e}", config.kad_protocol),
        },
    )?;

    let mut kad_config = kad::Config::new(protocol);
    kad_config.set_query_timeout(Duration::from_secs(config.kad_query_timeout_secs));

    let store = kad::store::MemoryStore::new(local_peer_id);
    let kademlia = kad::Behaviour::with_config(local_peer_id, store, kad_config);

    // --- Identify -----------------------------------------------------------

    let identify_config = identify::Config::new("/ipfs/id/1.0.0".into(), keypair.public())
        .with_agent_version(format!("meshchat-node/{}", env!("CARGO_PKG_VERSION")));

    let identify = identify::Behaviour::new(identify_config);

    Ok(DiscoveryBehaviour { kademlia, identify })
}

// ---------------------------------------------------------------------------
// DHT operations
// ---------------------------------------------------------------------------

impl DiscoveryBehaviour {
    /// Announces this node as a provider of [`RENDEZVOUS_KEY`].
    ///
    /// One-shot and best-effort: the record is republished by
    /// Kademlia internally once registered.
    ///
    /// # Returns
    ///
    /// The `QueryId` of the DHT provide operation. The result is
    /// delivered asynchronously via `DiscoveryBehaviourEvent::Kademlia`
    /// in the swarm event loop.
    ///
    /// # Errors
    ///
    /// Returns `MeshchatError::NetworkError` if the provider record
    /// cannot be stored locally.
    pub fn advertise(&mut self) -> MResult<kad::QueryId> {
        let key = kad::RecordKey::new(&RENDEZVOUS_KEY);
        self.kademlia
            .start_providing(key)
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to advertise under rendezvous key: {e}"),
            })
    }

    /// Initiates a DHT lookup for other providers of
    /// [`RENDEZVOUS_KEY`].
    ///
    /// Discovered peers are delivered asynchronously through
    /// `kad::Event::OutboundQueryProgressed` results in the swarm
    /// event loop. Called periodically; each call starts one query.
    pub fn find_peers(&mut self) -> kad::QueryId {
        let key = kad::RecordKey::new(&RENDEZVOUS_KEY);
        self.kademlia.get_providers(key)
    }

    /// Adds a seed peer's address to the Kademlia routing table.
    pub fn add_seed_address(&mut self, peer_id: &PeerId, addr: Multiaddr) {
        self.kademlia.add_address(peer_id, addr);
    }

    /// Initiates a Kademlia bootstrap operation.
    ///
    /// Performs a lookup for the local peer ID to populate the
    /// routing table with nearby peers. Should be called after seed
    /// addresses have been added.
    ///
    /// # Errors
    ///
    /// Returns `MeshchatError::NetworkError` if the bootstrap cannot
    /// be started (e.g. no known peers).
    pub fn bootstrap(&mut self) -> MResult<kad::QueryId> {
        self.kademlia
            .bootstrap()
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to start Kademlia bootstrap: {e}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Splits a fully-qualified multiaddr into its `PeerId` and the
/// address without the `/p2p/` component.
///
/// Given `/ip4/1.2.3.4/tcp/4001/p2p/12D3KooW...`, returns
/// `Some((PeerId, /ip4/1.2.3.4/tcp/4001))`.
///
/// Returns `None` if the multiaddr does not contain a `/p2p/`
/// component.
pub fn split_peer_addr(addr: &Multiaddr) -> Option<(PeerId, Multiaddr)> {
    let mut clean_addr = Multiaddr::empty();
    let mut peer_id = None;

    for proto in addr.iter() {
        match proto {
            libp2p::multiaddr::Protocol::P2p(id) => {
                peer_id = Some(id);
            }
            other => {
                clean_addr.push(other);
            }
        }
    }

    peer_id.map(|pid| (pid, clean_addr))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
