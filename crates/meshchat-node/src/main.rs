//! meshchat — headless P2P chat node.
//!
//! Usage:
//!
//!   meshchat [OPTIONS]
//!
//! Options:
//!
//!   --listen <MULTIADDR>         Listen address (default: /ip4/0.0.0.0/tcp/0)
//!   --bootstrap <MULTIADDR>      Add a bootstrap seed (repeatable)
//!   --discovery-interval <SECS>  Seconds between peer lookups
//!
//! The node speaks a line-oriented protocol: JSON events on stdout,
//! text commands (`connect`, `send`) on stdin. It runs until stdin
//! reaches end-of-file. All diagnostics go to stderr so stdout stays
//! machine-parseable.

use std::io::BufRead;

use tokio::sync::mpsc;

use meshchat_network::swarm::MeshchatSwarm;
use meshchat_node::cli::CliArgs;
use meshchat_node::emitter::Emitter;
use meshchat_node::event_loop::{run_event_loop, NodeRuntime};
use meshchat_types::Event;

#[tokio::main]
async fn main() {
    // Tracing / logging. stderr only: stdout is reserved for the
    // JSON event protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = CliArgs::parse_from_env();
    let config = match cli.into_network_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    // Identity and swarm construction. Failure here is fatal and
    // happens before any event is emitted.
    let (swarm, network_rx) = match MeshchatSwarm::new(config.clone()) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(%e, "failed to create node");
            std::process::exit(1);
        }
    };

    let emitter = Emitter;
    emitter.emit(&Event::Started {
        peer_id: swarm.local_peer_id().to_string(),
    });

    let line_rx = spawn_stdin_reader();

    let rt = NodeRuntime {
        swarm,
        network_rx,
        line_rx,
        emitter,
        config,
    };

    run_event_loop(rt).await;
}

/// Spawns a blocking task that forwards stdin lines to a channel.
///
/// stdin is a blocking stream, so reading happens on the blocking
/// thread pool. Dropping the sender on EOF closes the channel, which
/// the event loop treats as the shutdown signal.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(%e, "failed to read stdin");
                    break;
                }
            }
        }
        // tx drops here; the event loop sees the channel close.
    });

    rx
}
