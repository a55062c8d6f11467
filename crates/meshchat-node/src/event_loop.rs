//! Main event loop driving the node.
//!
//! [`run_event_loop`] uses `tokio::select!` to multiplex:
//!
//! 1. **Network swarm** — `poll_next()` drives libp2p event processing.
//! 2. **Network events** — connections, dial failures, discovered
//!    peers, chat messages.
//! 3. **stdin lines** — `connect` / `send` commands (gated until the
//!    bootstrap barrier releases; lines typed earlier queue up).
//! 4. **Discovery tick** — periodic provider lookup under the
//!    rendezvous key.
//!
//! The loop runs until stdin reaches end-of-file. In-flight network
//! activity simply stops when the process exits; there is no drain
//! phase.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use libp2p::PeerId;
use tokio::sync::mpsc;

use meshchat_network::config::NetworkConfig;
use meshchat_network::events::NetworkEvent;
use meshchat_network::swarm::MeshchatSwarm;
use meshchat_types::Event;

use crate::bootstrap::{resolve_seeds, BootstrapBarrier};
use crate::command::{parse_line, Command};
use crate::emitter::Emitter;

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// What a pending outbound dial was started for. Determines which
/// event is emitted when the attempt resolves.
#[derive(Clone, Copy, Debug, PartialEq)]
enum DialKind {
    /// Seed dial during startup; resolves the bootstrap barrier.
    Bootstrap,
    /// Dial to a peer found via DHT discovery.
    Discovery,
    /// Dial requested by a `connect` command.
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    /// Waiting for every seed dial to resolve. Commands and
    /// discovery are held back.
    Bootstrapping,
    /// Steady state: advertising, discovering, accepting commands.
    Running,
}

/// Everything the event loop owns.
pub struct NodeRuntime {
    pub swarm: MeshchatSwarm,
    pub network_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    /// Lines read from stdin by the reader task.
    pub line_rx: mpsc::UnboundedReceiver<String>,
    pub emitter: Emitter,
    pub config: NetworkConfig,
}

struct LoopState {
    phase: Phase,
    barrier: BootstrapBarrier,
    /// Outbound dials awaiting a connection or error. Exactly one
    /// event is emitted per entry.
    pending_dials: HashMap<PeerId, DialKind>,
    /// Peers we have already tried to reach via discovery, so
    /// repeated lookups do not redial them.
    attempted: HashSet<PeerId>,
}

// ---------------------------------------------------------------------------
// Event loop entry point
// ---------------------------------------------------------------------------

/// Runs the node until stdin closes.
pub async fn run_event_loop(mut rt: NodeRuntime) {
    tracing::info!(peer_id = %rt.swarm.local_peer_id(), "node event loop started");

    if let Err(e) = rt.swarm.start_listening(rt.config.listen_addr.clone()) {
        // The node can still dial out, so keep going.
        tracing::error!(%e, "failed to start listening, continuing without listener");
        rt.emitter.emit(&Event::Error {
            error: e.to_string(),
        });
    }

    let mut state = start_bootstrap(&mut rt);
    if state.barrier.released() {
        enter_running(&mut rt, &mut state);
    }

    let mut discovery_tick =
        tokio::time::interval(Duration::from_secs(rt.config.discovery_interval_secs));
    discovery_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // ---------------------------------------------------------------
            // 1. Drive the network swarm (process one libp2p event).
            // ---------------------------------------------------------------
            _ = rt.swarm.poll_next() => {}

            // ---------------------------------------------------------------
            // 2. Process network events emitted by the swarm.
            // ---------------------------------------------------------------
            Some(net_event) = rt.network_rx.recv() => {
                handle_network_event(&mut rt, &mut state, net_event);
            }

            // ---------------------------------------------------------------
            // 3. stdin commands. Held back until the bootstrap barrier
            //    releases; the unbounded channel buffers earlier lines.
            // ---------------------------------------------------------------
            line = rt.line_rx.recv(), if state.phase == Phase::Running => {
                match line {
                    Some(line) => handle_line(&mut rt, &mut state, &line),
                    None => {
                        tracing::info!("stdin closed, exiting event loop");
                        break;
                    }
                }
            }

            // ---------------------------------------------------------------
            // 4. Periodic rendezvous lookup.
            // ---------------------------------------------------------------
            _ = discovery_tick.tick(), if state.phase == Phase::Running => {
                rt.swarm.find_peers();
            }
        }
    }

    tracing::info!("node event loop exited");
}

// ---------------------------------------------------------------------------
// Bootstrap phase
// ---------------------------------------------------------------------------

/// Starts dialing every configured seed and returns the initial loop
/// state with the barrier tracking the attempts.
fn start_bootstrap(rt: &mut NodeRuntime) -> LoopState {
    rt.emitter.emit(&Event::Status {
        content: "Connecting to bootstrap peers...".into(),
    });

    let (seeds, invalid) = resolve_seeds(&rt.config.bootstrap_nodes);
    for addr in invalid {
        rt.emitter.emit(&Event::Error {
            error: format!("Invalid bootstrap address: {addr}"),
        });
    }

    let mut barrier = BootstrapBarrier::new(&seeds);
    let mut pending_dials = HashMap::new();

    for seed in &seeds {
        rt.swarm
            .add_seed_address(&seed.peer_id, seed.dial_addr.clone());
        match rt.swarm.dial_addr(seed.addr.clone()) {
            Ok(()) => {
                pending_dials.insert(seed.peer_id, DialKind::Bootstrap);
            }
            Err(e) => {
                rt.emitter.emit(&Event::Error {
                    error: format!("Bootstrap connect error: {}: {e}", seed.peer_id),
                });
                barrier.resolve(&seed.peer_id);
            }
        }
    }

    LoopState {
        phase: Phase::Bootstrapping,
        barrier,
        pending_dials,
        attempted: HashSet::new(),
    }
}

/// Transition out of the bootstrap phase: announce under the
/// rendezvous key, then start searching for peers. The first
/// discovery lookup fires from the (now ungated) discovery tick.
fn enter_running(rt: &mut NodeRuntime, state: &mut LoopState) {
    state.phase = Phase::Running;

    rt.emitter.emit(&Event::Status {
        content: "Announcing ourselves...".into(),
    });
    if let Err(e) = rt.swarm.advertise() {
        rt.emitter.emit(&Event::Error {
            error: e.to_string(),
        });
    }

    rt.emitter.emit(&Event::Status {
        content: "Searching for other peers...".into(),
    });

    // Populate the routing table beyond the seeds. Failure just
    // means no peers are known yet.
    if let Err(e) = rt.swarm.kad_bootstrap() {
        tracing::debug!(%e, "Kademlia bootstrap deferred");
    }
}

// ---------------------------------------------------------------------------
// Network event handling
// ---------------------------------------------------------------------------

fn handle_network_event(rt: &mut NodeRuntime, state: &mut LoopState, event: NetworkEvent) {
    match event {
        NetworkEvent::NewListenAddr(addr) => {
            tracing::info!(%addr, "listening");
        }

        NetworkEvent::PeerConnected(peer_id) => {
            match state.pending_dials.remove(&peer_id) {
                Some(kind) => {
                    rt.emitter.emit(&Event::Connected {
                        peer_id: peer_id.to_string(),
                    });
                    if kind == DialKind::Bootstrap && state.barrier.resolve(&peer_id) {
                        enter_running(rt, state);
                    }
                }
                None => {
                    // Inbound or relayed connection we did not ask for.
                    tracing::debug!(%peer_id, "unsolicited connection established");
                }
            }
        }

        NetworkEvent::DialFailed { peer_id, error } => {
            let Some(peer_id) = peer_id else {
                tracing::debug!(%error, "dial to unknown peer failed");
                return;
            };
            match state.pending_dials.remove(&peer_id) {
                Some(DialKind::Bootstrap) => {
                    rt.emitter.emit(&Event::Error {
                        error: format!("Bootstrap connect error: {peer_id}: {error}"),
                    });
                    if state.barrier.resolve(&peer_id) {
                        enter_running(rt, state);
                    }
                }
                Some(DialKind::Discovery) => {
                    rt.emitter.emit(&Event::Error {
                        error: format!("Connect to peer {peer_id} failed: {error}"),
                    });
                }
                Some(DialKind::Manual) => {
                    rt.emitter.emit(&Event::Error { error });
                }
                None => {
                    tracing::debug!(%peer_id, %error, "untracked dial failed");
                }
            }
        }

        NetworkEvent::PeersDiscovered(peers) => {
            for peer_id in peers {
                handle_discovered_peer(rt, state, peer_id);
            }
        }

        NetworkEvent::ChatMessage { source, data } => {
            rt.emitter.emit(&Event::Message {
                from: source.to_string(),
                content: String::from_utf8_lossy(&data).into_owned(),
            });
        }
    }
}

fn handle_discovered_peer(rt: &mut NodeRuntime, state: &mut LoopState, peer_id: PeerId) {
    if peer_id == *rt.swarm.local_peer_id() {
        return;
    }
    if state.attempted.contains(&peer_id) || rt.swarm.is_connected(&peer_id) {
        return;
    }
    state.attempted.insert(peer_id);

    rt.emitter.emit(&Event::Status {
        content: format!("Found peer: {peer_id}. Connecting..."),
    });

    match rt.swarm.dial_peer(peer_id) {
        Ok(()) => {
            state.pending_dials.insert(peer_id, DialKind::Discovery);
        }
        Err(e) => {
            rt.emitter.emit(&Event::Error {
                error: format!("Connect to peer {peer_id} failed: {e}"),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Command handling
// ---------------------------------------------------------------------------

fn handle_line(rt: &mut NodeRuntime, state: &mut LoopState, line: &str) {
    match parse_line(line) {
        Ok(None) => {}
        Ok(Some(Command::Connect { addr, peer_id })) => {
            if peer_id == *rt.swarm.local_peer_id() {
                tracing::debug!("ignoring connect to self");
                return;
            }
            match rt.swarm.dial_addr(addr) {
                Ok(()) => {
                    state.pending_dials.insert(peer_id, DialKind::Manual);
                }
                Err(e) => {
                    rt.emitter.emit(&Event::Error {
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(Some(Command::Send { text })) => match rt.swarm.publish_chat(text.clone().into_bytes()) {
            Ok(message_id) => {
                tracing::debug!(?message_id, "chat message published");
                rt.emitter.emit(&Event::Sent { content: text });
            }
            Err(e) => {
                tracing::debug!(%e, "publish failed");
                rt.emitter.emit(&Event::Error {
                    error: "Failed to publish".into(),
                });
            }
        },
        Err(e) => {
            rt.emitter.emit(&Event::Error {
                error: e.to_string(),
            });
        }
    }
}
