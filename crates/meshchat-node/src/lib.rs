//! Meshchat node orchestration.
//!
//! Wires the network layer to the line-oriented external interface:
//! JSON events on stdout, text commands on stdin. The [`event_loop`]
//! module owns the runtime; [`command`] parses the stdin protocol;
//! [`emitter`] serializes events; [`bootstrap`] tracks the startup
//! barrier over the seed peers.

pub mod bootstrap;
pub mod cli;
pub mod command;
pub mod emitter;
pub mod event_loop;
