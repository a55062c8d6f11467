//! Gossipsub wrapper for the Meshchat message bus.
//!
//! All chat traffic flows over a single hard-coded topic,
//! [`CHAT_TOPIC`]. Published messages are signed with the node's
//! identity so receivers can attribute them to a stable peer id.
//!
//! Messages exceeding [`MAX_CHAT_SIZE`] are rejected to prevent
//! gossip flooding.

use libp2p::gossipsub;
use libp2p::identity;

use meshchat_types::{MeshchatError, Result};

use crate::config::CHAT_TOPIC;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed chat message size (64 KiB).
pub const MAX_CHAT_SIZE: usize = 65_536;

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Builds a configured `gossipsub::Behaviour` subscribed to the chat
/// topic.
///
/// # Parameters
///
/// - `keypair` — libp2p identity keypair for message signing
///   (`MessageAuthenticity::Signed`).
///
/// # Errors
///
/// Returns `MeshchatError::NetworkError` if the gossipsub config is
/// invalid or the topic subscription fails. Both are startup
/// construction failures and therefore fatal to the caller.
pub fn build_gossip_behaviour(
    keypair: &identity::Keypair,
) -> Result<gossipsub::Behaviour> {
    let config = gossipsub::ConfigBuilder::default()
        .max_transmit_size(MAX_CHAT_SIZE)
        .build()
        .map_err(|e| MeshchatError::NetworkError {
            reason: format!("failed to build gossipsub config: {e}"),
        })?;

    let mut behaviour = gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(keypair.clone()),
        config,
    )
    .map_err(|e| MeshchatError::NetworkError {
        reason: format!("failed to create gossipsub behaviour: {e}"),
    })?;

    behaviour
        .subscribe(&chat_topic())
        .map_err(|e| MeshchatError::NetworkError {
            reason: format!("failed to subscribe to topic '{CHAT_TOPIC}': {e}"),
        })?;

    Ok(behaviour)
}

// ---------------------------------------------------------------------------
// Topic helpers
// ---------------------------------------------------------------------------

/// The chat room topic.
pub fn chat_topic() -> gossipsub::IdentTopic {
    gossipsub::IdentTopic::new(CHAT_TOPIC)
}

/// Publishes a chat payload to the chat topic.
///
/// # Errors
///
/// Returns `MeshchatError::NetworkError` if the data exceeds
/// [`MAX_CHAT_SIZE`] or publishing fails (e.g. no peers in the
/// gossip mesh yet).
pub fn publish_chat(
    behaviour: &mut gossipsub::Behaviour,
    data: Vec<u8>,
) -> Result<gossipsub::MessageId> {
    if data.len() > MAX_CHAT_SIZE {
        return Err(MeshchatError::NetworkError {
            reason: format!(
                "chat payload size {} exceeds maximum {}",
                data.len(),
                MAX_CHAT_SIZE,
            ),
        });
    }

    behaviour
        .publish(chat_topic(), data)
        .map_err(|e| MeshchatError::NetworkError {
            reason: format!("failed to publish to topic '{CHAT_TOPIC}': {e}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_gossip_behaviour_succeeds() {
        let keypair = identity::Keypair::generate_ed25519();
        assert!(build_gossip_behaviour(&keypair).is_ok());
    }

    #[test]
    fn chat_topic_hash_is_stable() {
        assert_eq!(chat_topic().hash(), chat_topic().hash());
    }

    #[test]
    fn oversized_payload_rejected() {
        let keypair = identity::Keypair::generate_ed25519();
        let mut behaviour = build_gossip_behaviour(&keypair).unwrap();

        let big_data = vec![0u8; MAX_CHAT_SIZE + 1];
        assert!(publish_chat(&mut behaviour, big_data).is_err());
    }

    #[test]
    fn publish_without_peers_fails_recoverably() {
        // With no peers in the mesh, gossipsub reports
        // InsufficientPeers. That must surface as an Err, not a panic.
        let keypair = identity::Keypair::generate_ed25519();
        let mut behaviour = build_gossip_behaviour(&keypair).unwrap();

        let result = publish_chat(&mut behaviour, b"hello".to_vec());
        assert!(result.is_err());
    }
}
