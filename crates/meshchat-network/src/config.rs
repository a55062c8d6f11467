//! Network configuration for the Meshchat libp2p layer.
//!
//! All values have documented defaults. Validation ensures no
//! zero-valued timeouts or invalid protocol names at startup.
//!
//! The bootstrap seed list, the rendezvous key, and the chat topic
//! are fixed constants; the config only carries the listen address
//! and timing tunables.

use std::net::Ipv4Addr;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};

use meshchat_types::{MeshchatError, Result};

// ---------------------------------------------------------------------------
// Well-known constants
// ---------------------------------------------------------------------------

/// Default bootstrap seeds: the public IPFS bootstrap nodes.
///
/// These are well-known entry points into the public Kademlia DHT.
/// They are NOT central servers — once a node has discovered peers
/// through the DHT, it no longer needs them.
///
/// Format: `/ip4/<ip>/tcp/<port>/p2p/<peer_id>`
///    or:  `/dnsaddr/<domain>/p2p/<peer_id>`
pub const DEFAULT_BOOTSTRAP_NODES: &[&str] = &[
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmcZf59bWwK5XFi76CZX8cbJ4BhTzzA3gU1ZjYZcYW3dwt",
    "/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ",
];

/// Rendezvous key under which all chat participants advertise and
/// search for each other in the DHT.
pub const RENDEZVOUS_KEY: &str = "chat-room";

/// Gossipsub topic carrying chat messages. Same string as the
/// rendezvous key — one room, one topic.
pub const CHAT_TOPIC: &str = "chat-room";

// ---------------------------------------------------------------------------
// NetworkConfig
// ---------------------------------------------------------------------------

/// Network-layer configuration.
///
/// Controls the listening address, bootstrap seeds, timeout
/// durations, and DHT settings for the libp2p swarm.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Multiaddr on which this node listens for incoming connections.
    ///
    /// Default: `/ip4/0.0.0.0/tcp/0` (OS-assigned port on all interfaces).
    #[serde(with = "multiaddr_serde")]
    pub listen_addr: Multiaddr,

    /// Bootstrap seeds to connect to on startup.
    ///
    /// Each entry must be a fully-qualified multiaddr containing a
    /// `/p2p/<peer_id>` component. Entries without one are reported
    /// as per-seed errors at startup rather than rejected here.
    #[serde(with = "multiaddr_vec_serde")]
    pub bootstrap_nodes: Vec<Multiaddr>,

    /// Seconds before an idle connection is closed by the swarm.
    pub idle_timeout_secs: u64,

    /// Kademlia protocol name.
    ///
    /// Default: `/ipfs/kad/1.0.0`, so the node participates in the
    /// same DHT the default seeds belong to.
    pub kad_protocol: String,

    /// Seconds before a Kademlia query times out.
    pub kad_query_timeout_secs: u64,

    /// Seconds between provider lookups under [`RENDEZVOUS_KEY`].
    pub discovery_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Construct the default listen address without parsing so no
        // fallible call is needed here.
        let listen_addr = Multiaddr::empty()
            .with(Protocol::Ip4(Ipv4Addr::UNSPECIFIED))
            .with(Protocol::Tcp(0));

        let bootstrap_nodes = DEFAULT_BOOTSTRAP_NODES
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        Self {
            listen_addr,
            bootstrap_nodes,
            idle_timeout_secs: 60,
            kad_protocol: "/ipfs/kad/1.0.0".into(),
            kad_query_timeout_secs: 60,
            discovery_interval_secs: 30,
        }
    }
}

impl NetworkConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `MeshchatError::ConfigError` if any timeout is zero or
    /// the Kademlia protocol name is empty or malformed.
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            return Err(MeshchatError::ConfigError {
                reason: "idle_timeout_secs must be greater than 0".into(),
            });
        }
        if self.kad_query_timeout_secs == 0 {
            return Err(MeshchatError::ConfigError {
                reason: "kad_query_timeout_secs must be greater than 0".into(),
            });
        }
        if self.discovery_interval_secs == 0 {
            return Err(MeshchatError::ConfigError {
                reason: "discovery_interval_secs must be greater than 0".into(),
            });
        }
        if !self.kad_protocol.starts_with('/') {
            return Err(MeshchatError::ConfigError {
                reason: format!(
                    "kad_protocol must start with '/': '{}'",
                    self.kad_protocol,
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for Multiaddr
// ---------------------------------------------------------------------------

mod multiaddr_serde {
    use libp2p::Multiaddr;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        addr: &Multiaddr,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Multiaddr, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod multiaddr_vec_serde {
    use libp2p::Multiaddr;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        addrs: &[Multiaddr],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let strings: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
        serde::Serialize::serialize(&strings, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Multiaddr>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_seeds_all_parse() {
        let config = NetworkConfig::default();
        assert_eq!(config.bootstrap_nodes.len(), DEFAULT_BOOTSTRAP_NODES.len());
    }

    #[test]
    fn zero_idle_timeout_rejected() {
        let config = NetworkConfig {
            idle_timeout_secs: 0,
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_discovery_interval_rejected() {
        let config = NetworkConfig {
            discovery_interval_secs: 0,
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_kad_protocol_rejected() {
        let config = NetworkConfig {
            kad_protocol: "not-a-protocol".into(),
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_serde_round_trip() {
        let config = NetworkConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: NetworkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.listen_addr, config.listen_addr);
        assert_eq!(back.bootstrap_nodes, config.bootstrap_nodes);
        assert_eq!(back.kad_protocol, config.kad_protocol);
    }
}
