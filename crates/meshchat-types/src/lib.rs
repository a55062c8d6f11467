//! Core shared types for the Meshchat decentralized chat overlay.
//!
//! This crate defines the external event protocol and the central
//! error type used across the workspace. No other crate should
//! define shared types — everything lives here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Structured outcome emitted on the node's output stream.
///
/// Every discrete outcome of the orchestration layer (startup,
/// bootstrap attempt, peer discovery, chat message, command result)
/// maps to exactly one `Event`. Rendered as one JSON object per line
/// on stdout:
///
/// ```text
/// {"type":"started","peerId":"<id>"}
/// {"type":"status","content":"<text>"}
/// {"type":"connected","peerId":"<id>"}
/// {"type":"message","from":"<id>","content":"<text>"}
/// {"type":"sent","content":"<text>"}
/// {"type":"error","error":"<text>"}
/// ```
///
/// Fields irrelevant to a kind are not serialized at all — a
/// `status` event never carries a `peerId`, and so on.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// The node identity was created and the node is up.
    Started {
        /// This node's own peer identifier.
        #[serde(rename = "peerId")]
        peer_id: String,
    },

    /// Free-text progress information.
    Status {
        /// Human-readable status text.
        content: String,
    },

    /// A connection attempt to a remote peer succeeded.
    Connected {
        /// Peer identifier of the remote.
        #[serde(rename = "peerId")]
        peer_id: String,
    },

    /// A chat message was received from the gossip bus.
    Message {
        /// Peer identifier of the originating peer.
        from: String,
        /// Raw text payload.
        content: String,
    },

    /// A chat message was published to the gossip bus.
    Sent {
        /// The text that was published, verbatim.
        content: String,
    },

    /// A recoverable failure occurred.
    Error {
        /// Human-readable description of the failure.
        error: String,
    },
}

// ---------------------------------------------------------------------------
// MeshchatError
// ---------------------------------------------------------------------------

/// Central error type for the Meshchat system.
///
/// All crates in the workspace convert their internal errors into
/// variants of this enum, ensuring a unified error handling surface.
#[derive(Debug, Error)]
pub enum MeshchatError {
    /// A configuration value is missing, zero, or inconsistent.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// A networking or transport operation failed.
    #[error("network error: {reason}")]
    NetworkError {
        /// Human-readable description of the network failure.
        reason: String,
    },

    /// A peer address is malformed or missing its peer identifier.
    #[error("invalid address: {reason}")]
    InvalidAddress {
        /// Human-readable description of why the address is invalid.
        reason: String,
    },
}

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MeshchatError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
