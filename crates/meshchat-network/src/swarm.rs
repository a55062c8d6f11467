//! High-level swarm wrapper for the Meshchat overlay.
//!
//! [`MeshchatSwarm`] encapsulates the libp2p `Swarm` with the combined
//! [`MeshchatBehaviour`] and provides an async event pump for DHT
//! discovery, gossip chat delivery, and dial outcome reporting.
//!
//! The routing capability (Kademlia) both requires the node identity
//! and is required by it: the swarm builder resolves this by
//! constructing the behaviour inside the `with_behaviour` closure,
//! after which the handle stays reachable through
//! `swarm.behaviour_mut().discovery`.

use std::time::Duration;

use futures::StreamExt;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{dcutr, gossipsub, identify, kad, noise, relay, yamux, Multiaddr, PeerId, Swarm};
use tokio::sync::mpsc;

use meshchat_types::MeshchatError;

use crate::config::NetworkConfig;
use crate::discovery::{
    build_discovery_behaviour, DiscoveryBehaviour, DiscoveryBehaviourEvent,
};
use crate::events::NetworkEvent;
use crate::gossip;
use crate::transport;

/// Convenience alias to avoid shadowing `std::result::Result`
/// which the `#[derive(NetworkBehaviour)]` macro requires.
type MResult<T> = std::result::Result<T, MeshchatError>;

// ---------------------------------------------------------------------------
// Combined behaviour
// ---------------------------------------------------------------------------

/// Combined libp2p behaviour for Meshchat.
///
/// Composes:
/// - [`DiscoveryBehaviour`] — Kademlia DHT + Identify.
/// - `gossipsub::Behaviour` — the chat topic pub/sub.
/// - `relay::client::Behaviour` — Circuit Relay v2 client.
/// - `dcutr::Behaviour` — hole punching over relayed connections.
///
/// The `#[derive(NetworkBehaviour)]` macro auto-generates
/// `MeshchatBehaviourEvent` with one variant per field.
#[derive(NetworkBehaviour)]
pub struct MeshchatBehaviour {
    /// Kademlia + Identify.
    pub discovery: DiscoveryBehaviour,
    /// Pub/sub for chat messages.
    pub gossip: gossipsub::Behaviour,
    /// Relay client for NAT traversal.
    pub relay_client: relay::client::Behaviour,
    /// Direct Connection Upgrade through Relay (hole punching).
    pub dcutr: dcutr::Behaviour,
}

// ---------------------------------------------------------------------------
// MeshchatSwarm
// ---------------------------------------------------------------------------

/// High-level wrapper around `Swarm<MeshchatBehaviour>`.
///
/// # Usage
///
/// ```ignore
/// let (mut swarm, network_rx) = MeshchatSwarm::new(config)?;
/// swarm.start_listening(listen_addr)?;
/// loop { swarm.poll_next().await; }
/// ```
pub struct MeshchatSwarm {
    /// The underlying libp2p swarm.
    swarm: Swarm<MeshchatBehaviour>,
    /// Sender-side event channel (receiver given to caller).
    event_sender: mpsc::UnboundedSender<NetworkEvent>,
}

impl MeshchatSwarm {
    /// Creates a new swarm with a fresh ed25519 identity and the
    /// combined discovery, gossip, relay, and DCUtR behaviours.
    ///
    /// Returns `(swarm, event_receiver)` where `event_receiver` is
    /// the async channel delivering all [`NetworkEvent`]s.
    ///
    /// # Errors
    ///
    /// Returns `MeshchatError::NetworkError` if transport, behaviour,
    /// or identity construction fails. All such failures occur before
    /// the node has emitted any event and are fatal to startup.
    pub fn new(
        config: NetworkConfig,
    ) -> MResult<(Self, mpsc::UnboundedReceiver<NetworkEvent>)> {
        config.validate()?;

        let keypair = crate::identity::generate();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let config_clone = config.clone();
        let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                transport::tcp_config(),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to configure TCP transport: {e}"),
            })?
            .with_quic()
            .with_dns()
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to configure DNS transport: {e}"),
            })?
            .with_relay_client(noise::Config::new, yamux::Config::default)
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to configure relay client transport: {e}"),
            })?
            .with_behaviour(|key, relay_client| {
                build_combined_behaviour(key, relay_client, &config_clone)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to build network behaviour: {e}"),
            })?
            .with_swarm_config(|cfg| {
                cfg.with_idle_connection_timeout(Duration::from_secs(
                    config.idle_timeout_secs,
                ))
            })
            .build();

        let me = Self {
            swarm,
            event_sender: event_tx,
        };

        Ok((me, event_rx))
    }

    /// Returns the local `PeerId` of this swarm.
    pub fn local_peer_id(&self) -> &PeerId {
        self.swarm.local_peer_id()
    }

    // -----------------------------------------------------------------------
    // Listening
    // -----------------------------------------------------------------------

    /// Starts listening on the given multiaddr.
    ///
    /// # Errors
    ///
    /// Returns `MeshchatError::NetworkError` if the address cannot
    /// be bound (e.g. port already in use).
    pub fn start_listening(&mut self, addr: Multiaddr) -> MResult<()> {
        self.swarm
            .listen_on(addr)
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to start listening: {e}"),
            })?;
        Ok(())
    }

    /// Returns the list of addresses this swarm is currently listening on.
    pub fn listeners(&self) -> Vec<Multiaddr> {
        self.swarm.listeners().cloned().collect()
    }

    /// Returns whether a connection to `peer_id` is currently open.
    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.swarm.is_connected(peer_id)
    }

    // -----------------------------------------------------------------------
    // Dialing
    // -----------------------------------------------------------------------

    /// Dials a remote peer at the given multiaddr.
    ///
    /// The address should carry a `/p2p/` component so the dial
    /// outcome can be attributed to a peer id.
    pub fn dial_addr(&mut self, addr: Multiaddr) -> MResult<()> {
        self.swarm
            .dial(addr)
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to dial peer: {e}"),
            })
    }

    /// Dials a peer by id, using addresses known to the routing table.
    pub fn dial_peer(&mut self, peer_id: PeerId) -> MResult<()> {
        self.swarm
            .dial(DialOpts::peer_id(peer_id).build())
            .map_err(|e| MeshchatError::NetworkError {
                reason: format!("failed to dial peer {peer_id}: {e}"),
            })
    }

    // -----------------------------------------------------------------------
    // Discovery (DHT)
    // -----------------------------------------------------------------------

    /// Adds a seed peer's address to the Kademlia routing table.
    pub fn add_seed_address(&mut self, peer_id: &PeerId, addr: Multiaddr) {
        self.swarm
            .behaviour_mut()
            .discovery
            .add_seed_address(peer_id, addr);
    }

    /// Announces this node under the rendezvous key.
    pub fn advertise(&mut self) -> MResult<kad::QueryId> {
        self.swarm.behaviour_mut().discovery.advertise()
    }

    /// Starts a provider lookup under the rendezvous key.
    ///
    /// Results arrive as [`NetworkEvent::PeersDiscovered`].
    pub fn find_peers(&mut self) -> kad::QueryId {
        self.swarm.behaviour_mut().discovery.find_peers()
    }

    /// Initiates a Kademlia bootstrap to populate the routing table.
    pub fn kad_bootstrap(&mut self) -> MResult<kad::QueryId> {
        self.swarm.behaviour_mut().discovery.bootstrap()
    }

    /// Forces the Kademlia mode instead of the automatic
    /// client/server detection. Used by tests that run without
    /// externally reachable addresses.
    pub fn set_kademlia_mode(&mut self, mode: Option<kad::Mode>) {
        self.swarm.behaviour_mut().discovery.kademlia.set_mode(mode);
    }

    // -----------------------------------------------------------------------
    // Gossip
    // -----------------------------------------------------------------------

    /// Publishes a chat payload to the chat topic.
    pub fn publish_chat(&mut self, data: Vec<u8>) -> MResult<gossipsub::MessageId> {
        gossip::publish_chat(&mut self.swarm.behaviour_mut().gossip, data)
    }

    // -----------------------------------------------------------------------
    // Event pump
    // -----------------------------------------------------------------------

    /// Processes a single swarm event.
    ///
    /// Designed for use inside `tokio::select!` where the caller
    /// multiplexes swarm events with other async sources (commands,
    /// timers). Each call drives the libp2p swarm forward by one
    /// event; observable outcomes are delivered on the
    /// [`NetworkEvent`] channel.
    pub async fn poll_next(&mut self) {
        match self.swarm.select_next_some().await {
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                tracing::info!(%address, ?listener_id, "new listen address");
                let _ = self
                    .event_sender
                    .send(NetworkEvent::NewListenAddr(address));
            }

            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                tracing::info!(
                    %peer_id,
                    ?endpoint,
                    %num_established,
                    "connection established"
                );
                let _ = self
                    .event_sender
                    .send(NetworkEvent::PeerConnected(peer_id));
            }

            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                tracing::info!(%peer_id, ?cause, num_established, "connection closed");
            }

            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                tracing::warn!(?peer_id, %error, "outgoing connection error");
                let _ = self.event_sender.send(NetworkEvent::DialFailed {
                    peer_id,
                    error: error.to_string(),
                });
            }

            SwarmEvent::IncomingConnectionError {
                local_addr,
                send_back_addr,
                error,
                ..
            } => {
                tracing::warn!(
                    %local_addr,
                    %send_back_addr,
                    %error,
                    "incoming connection error"
                );
            }

            SwarmEvent::Behaviour(event) => {
                self.handle_behaviour_event(event);
            }

            other => {
                tracing::trace!(?other, "unhandled swarm event");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal event dispatch
    // -----------------------------------------------------------------------

    fn handle_behaviour_event(&mut self, event: MeshchatBehaviourEvent) {
        match event {
            MeshchatBehaviourEvent::Discovery(disc) => {
                self.handle_discovery_event(disc);
            }
            MeshchatBehaviourEvent::Gossip(gossip_event) => {
                self.handle_gossip_event(gossip_event);
            }
            MeshchatBehaviourEvent::RelayClient(relay_event) => {
                log_relay_client_event(&relay_event);
            }
            MeshchatBehaviourEvent::Dcutr(dcutr_event) => {
                log_dcutr_event(dcutr_event);
            }
        }
    }

    fn handle_discovery_event(&mut self, event: DiscoveryBehaviourEvent) {
        match event {
            DiscoveryBehaviourEvent::Kademlia(kad_event) => {
                self.handle_kademlia_event(kad_event);
            }
            DiscoveryBehaviourEvent::Identify(id_event) => {
                self.handle_identify_event(id_event);
            }
        }
    }

    fn handle_kademlia_event(&mut self, event: kad::Event) {
        match event {
            kad::Event::OutboundQueryProgressed { id, result, .. } => match result {
                kad::QueryResult::GetProviders(Ok(kad::GetProvidersOk::FoundProviders {
                    providers,
                    ..
                })) => {
                    tracing::debug!(?id, count = providers.len(), "providers found");
                    if !providers.is_empty() {
                        let _ = self.event_sender.send(NetworkEvent::PeersDiscovered(
                            providers.into_iter().collect(),
                        ));
                    }
                }
                kad::QueryResult::GetProviders(Ok(
                    kad::GetProvidersOk::FinishedWithNoAdditionalRecord { .. },
                )) => {
                    tracing::debug!(?id, "provider lookup finished");
                }
                kad::QueryResult::GetProviders(Err(e)) => {
                    tracing::warn!(?id, ?e, "provider lookup failed");
                }
                kad::QueryResult::StartProviding(Ok(kad::AddProviderOk { key })) => {
                    tracing::info!(?id, ?key, "rendezvous advertise succeeded");
                }
                kad::QueryResult::StartProviding(Err(e)) => {
                    tracing::warn!(?id, ?e, "rendezvous advertise failed");
                }
                kad::QueryResult::Bootstrap(Ok(kad::BootstrapOk {
                    peer,
                    num_remaining,
                })) => {
                    tracing::info!(?id, %peer, num_remaining, "Kademlia bootstrap progress");
                }
                kad::QueryResult::Bootstrap(Err(e)) => {
                    tracing::warn!(?id, ?e, "Kademlia bootstrap failed");
                }
                other => {
                    tracing::trace!(?id, ?other, "other Kademlia query result");
                }
            },
            kad::Event::RoutingUpdated {
                peer, addresses, ..
            } => {
                tracing::debug!(%peer, ?addresses, "Kademlia routing table updated");
            }
            other => {
                tracing::trace!(?other, "other Kademlia event");
            }
        }
    }

    /// Handles Identify events.
    ///
    /// Addresses learned from Identify are fed into Kademlia so the
    /// routing table can resolve discovered peers to dialable
    /// addresses.
    fn handle_identify_event(&mut self, event: identify::Event) {
        match event {
            identify::Event::Received { peer_id, info, .. } => {
                tracing::debug!(
                    %peer_id,
                    protocol_version = %info.protocol_version,
                    agent_version = %info.agent_version,
                    "identify: received peer info"
                );
                for addr in info.listen_addrs {
                    self.swarm
                        .behaviour_mut()
                        .discovery
                        .add_seed_address(&peer_id, addr);
                }
            }
            identify::Event::Sent { peer_id, .. } => {
                tracing::debug!(%peer_id, "identify: sent our info to peer");
            }
            identify::Event::Pushed { peer_id, .. } => {
                tracing::debug!(%peer_id, "identify: pushed info update to peer");
            }
            identify::Event::Error { peer_id, error, .. } => {
                tracing::warn!(%peer_id, %error, "identify: error");
            }
        }
    }

    fn handle_gossip_event(&self, event: gossipsub::Event) {
        match event {
            gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            } => {
                if let Some(chat) =
                    inbound_chat(self.swarm.local_peer_id(), propagation_source, message)
                {
                    let _ = self.event_sender.send(chat);
                }
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                tracing::debug!(%peer_id, %topic, "peer subscribed to topic");
            }
            gossipsub::Event::Unsubscribed { peer_id, topic } => {
                tracing::debug!(%peer_id, %topic, "peer unsubscribed from topic");
            }
            gossipsub::Event::GossipsubNotSupported { peer_id } => {
                tracing::trace!(%peer_id, "gossipsub not supported by peer");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Gossip message filtering
// ---------------------------------------------------------------------------

/// Maps an inbound gossipsub message to a [`NetworkEvent`], or `None`
/// if it originated from the local node.
///
/// The mesh may echo the node's own publications back; those must be
/// discarded silently, never surfaced as received messages.
fn inbound_chat(
    local: &PeerId,
    propagation_source: PeerId,
    message: gossipsub::Message,
) -> Option<NetworkEvent> {
    let source = message.source.unwrap_or(propagation_source);
    if source == *local || propagation_source == *local {
        tracing::trace!("dropping self-originated chat message");
        return None;
    }
    Some(NetworkEvent::ChatMessage {
        source,
        data: message.data,
    })
}

// ---------------------------------------------------------------------------
// Relay / DCUtR event logging
// ---------------------------------------------------------------------------

fn log_relay_client_event(event: &relay::client::Event) {
    match event {
        relay::client::Event::ReservationReqAccepted {
            relay_peer_id,
            renewal,
            ..
        } => {
            tracing::info!(%relay_peer_id, renewal, "relay reservation accepted");
        }
        relay::client::Event::OutboundCircuitEstablished { relay_peer_id, .. } => {
            tracing::info!(%relay_peer_id, "outbound relay circuit established");
        }
        relay::client::Event::InboundCircuitEstablished { src_peer_id, .. } => {
            tracing::info!(%src_peer_id, "inbound relay circuit established");
        }
    }
}

fn log_dcutr_event(event: dcutr::Event) {
    let remote_peer_id = event.remote_peer_id;
    match event.result {
        Ok(connection_id) => {
            tracing::info!(
                %remote_peer_id,
                ?connection_id,
                "hole punch succeeded, direct connection active"
            );
        }
        Err(error) => {
            tracing::debug!(%remote_peer_id, ?error, "hole punch failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour construction
// ---------------------------------------------------------------------------

/// Builds the combined [`MeshchatBehaviour`].
///
/// Runs inside the swarm builder's behaviour closure, which receives
/// both the identity keypair and the relay client behaviour produced
/// by the relay transport.
fn build_combined_behaviour(
    key: &libp2p::identity::Keypair,
    relay_client: relay::client::Behaviour,
    config: &NetworkConfig,
) -> MResult<MeshchatBehaviour> {
    let discovery = build_discovery_behaviour(key, config)?;
    let gossip = gossip::build_gossip_behaviour(key)?;
    let dcutr = dcutr::Behaviour::new(crate::identity::peer_id_of(key));

    Ok(MeshchatBehaviour {
        discovery,
        gossip,
        relay_client,
        dcutr,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
