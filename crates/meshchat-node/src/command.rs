//! stdin command protocol.
//!
//! Two commands are recognized:
//!
//! - `connect <multiaddr>` — dial a peer at a fully-qualified
//!   multiaddr (must include a `/p2p/<peer_id>` component).
//! - `send <message>` — publish a chat message; everything after the
//!   first space is the payload, verbatim.
//!
//! Blank lines are ignored. Anything else is an error. Parse errors
//! never terminate the node; they surface as error events and the
//! node keeps reading.

use libp2p::{Multiaddr, PeerId};
use thiserror::Error;

use meshchat_network::discovery::split_peer_addr;

/// A parsed stdin command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Dial the given peer. `addr` retains its `/p2p/` component.
    Connect { addr: Multiaddr, peer_id: PeerId },
    /// Publish `text` to the chat topic.
    Send { text: String },
}

/// Command parse failures. The display strings are the exact error
/// payloads surfaced on the output protocol.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Usage: connect <multiaddr>")]
    ConnectUsage,
    #[error("Invalid multiaddr")]
    InvalidMultiaddr,
    #[error("Invalid peer info")]
    InvalidPeerInfo,
    #[error("Usage: send <message>")]
    SendUsage,
    #[error("Unknown command")]
    UnknownCommand,
}

/// Parses one stdin line.
///
/// Returns `Ok(None)` for blank lines, `Ok(Some(command))` for a
/// recognized command, and `Err` for malformed input.
pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(' ') {
        Some((verb, rest)) => (verb, Some(rest)),
        None => (line, None),
    };

    match verb {
        "connect" => parse_connect(rest).map(Some),
        "send" => parse_send(rest).map(Some),
        _ => Err(CommandError::UnknownCommand),
    }
}

fn parse_connect(arg: Option<&str>) -> Result<Command, CommandError> {
    let arg = match arg.map(str::trim) {
        Some(a) if !a.is_empty() => a,
        _ => return Err(CommandError::ConnectUsage),
    };

    let addr: Multiaddr = arg.parse().map_err(|_| CommandError::InvalidMultiaddr)?;
    let (peer_id, _) = split_peer_addr(&addr).ok_or(CommandError::InvalidPeerInfo)?;

    Ok(Command::Connect { addr, peer_id })
}

fn parse_send(arg: Option<&str>) -> Result<Command, CommandError> {
    // The payload is everything after the first space, verbatim.
    // Leading or internal whitespace is part of the message.
    match arg {
        Some(text) if !text.is_empty() => Ok(Command::Send { text: text.into() }),
        _ => Err(CommandError::SendUsage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_addr() -> (String, PeerId) {
        let keypair = libp2p::identity::Keypair::generate_ed25519();
        let peer_id = PeerId::from(keypair.public());
        (format!("/ip4/127.0.0.1/tcp/4001/p2p/{peer_id}"), peer_id)
    }

    #[test]
    fn blank_lines_ignored() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("\n"), Ok(None));
    }

    #[test]
    fn connect_with_full_addr() {
        let (addr, peer_id) = sample_addr();
        let cmd = parse_line(&format!("connect {addr}")).unwrap().unwrap();
        match cmd {
            Command::Connect {
                addr: parsed,
                peer_id: pid,
            } => {
                assert_eq!(parsed.to_string(), addr);
                assert_eq!(pid, peer_id);
            }
            other => panic!("expected Connect, got {other:?}"),
        }
    }

    #[test]
    fn connect_without_argument() {
        assert_eq!(parse_line("connect"), Err(CommandError::ConnectUsage));
        assert_eq!(parse_line("connect   "), Err(CommandError::ConnectUsage));
    }

    #[test]
    fn connect_with_garbage_addr() {
        assert_eq!(
            parse_line("connect not-a-multiaddr"),
            Err(CommandError::InvalidMultiaddr)
        );
    }

    #[test]
    fn connect_without_peer_component() {
        assert_eq!(
            parse_line("connect /ip4/127.0.0.1/tcp/4001"),
            Err(CommandError::InvalidPeerInfo)
        );
    }

    #[test]
    fn send_preserves_payload_verbatim() {
        let cmd = parse_line("send  hello   world ").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                text: " hello   world ".into()
            }
        );
    }

    #[test]
    fn send_without_payload() {
        assert_eq!(parse_line("send"), Err(CommandError::SendUsage));
    }

    #[test]
    fn unknown_command_rejected() {
        assert_eq!(parse_line("quit"), Err(CommandError::UnknownCommand));
        assert_eq!(
            parse_line("sendx message"),
            Err(CommandError::UnknownCommand)
        );
    }

    #[test]
    fn error_strings_are_stable() {
        assert_eq!(CommandError::InvalidMultiaddr.to_string(), "Invalid multiaddr");
        assert_eq!(CommandError::InvalidPeerInfo.to_string(), "Invalid peer info");
        assert_eq!(
            CommandError::ConnectUsage.to_string(),
            "Usage: connect <multiaddr>"
        );
        assert_eq!(CommandError::SendUsage.to_string(), "Usage: send <message>");
        assert_eq!(CommandError::UnknownCommand.to_string(), "Unknown command");
    }
}
