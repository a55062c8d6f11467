//! Startup barrier over the bootstrap seeds.
//!
//! The node dials every configured seed concurrently and waits until
//! each attempt has resolved — successfully or not — before it starts
//! advertising, discovering, and accepting commands. A seed that
//! fails does not block startup; only an unresolved attempt does.

use std::collections::HashSet;

use libp2p::{Multiaddr, PeerId};

use meshchat_network::discovery::split_peer_addr;

/// A seed address resolved into its peer id and dialable form.
#[derive(Clone, Debug)]
pub struct Seed {
    pub peer_id: PeerId,
    /// Full multiaddr including the `/p2p/` component.
    pub addr: Multiaddr,
    /// Address with the `/p2p/` component stripped, for the routing
    /// table.
    pub dial_addr: Multiaddr,
}

/// Splits configured seed multiaddrs into dialable seeds and the
/// invalid leftovers (no `/p2p/` component).
pub fn resolve_seeds(addrs: &[Multiaddr]) -> (Vec<Seed>, Vec<Multiaddr>) {
    let mut seeds = Vec::new();
    let mut invalid = Vec::new();

    for addr in addrs {
        match split_peer_addr(addr) {
            Some((peer_id, dial_addr)) => seeds.push(Seed {
                peer_id,
                addr: addr.clone(),
                dial_addr,
            }),
            None => invalid.push(addr.clone()),
        }
    }

    (seeds, invalid)
}

/// Tracks outstanding bootstrap dials.
///
/// Starts with the full seed set; each dial outcome resolves one
/// entry. [`BootstrapBarrier::resolve`] returns `true` exactly once,
/// when the last outstanding attempt completes.
#[derive(Debug)]
pub struct BootstrapBarrier {
    pending: HashSet<PeerId>,
    released: bool,
}

impl BootstrapBarrier {
    pub fn new(seeds: &[Seed]) -> Self {
        let pending = seeds.iter().map(|s| s.peer_id).collect::<HashSet<_>>();
        Self {
            released: pending.is_empty(),
            pending,
        }
    }

    /// Whether the barrier has been passed.
    pub fn released(&self) -> bool {
        self.released
    }

    /// Whether `peer_id` is an outstanding bootstrap dial.
    pub fn is_pending(&self, peer_id: &PeerId) -> bool {
        self.pending.contains(peer_id)
    }

    /// Marks the dial to `peer_id` as resolved.
    ///
    /// Returns `true` if this resolution released the barrier.
    /// Resolving an untracked peer or an already-released barrier is
    /// a no-op.
    pub fn resolve(&mut self, peer_id: &PeerId) -> bool {
        if self.released || !self.pending.remove(peer_id) {
            return false;
        }
        if self.pending.is_empty() {
            self.released = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(n: u8) -> Seed {
        let keypair = libp2p::identity::Keypair::generate_ed25519();
        let peer_id = PeerId::from(keypair.public());
        let addr: Multiaddr = format!("/ip4/10.0.0.{n}/tcp/4001/p2p/{peer_id}")
            .parse()
            .unwrap();
        let (_, dial_addr) = split_peer_addr(&addr).unwrap();
        Seed {
            peer_id,
            addr,
            dial_addr,
        }
    }

    #[test]
    fn resolve_seeds_partitions_valid_and_invalid() {
        let good = seed(1);
        let bare: Multiaddr = "/ip4/10.0.0.2/tcp/4001".parse().unwrap();

        let (seeds, invalid) = resolve_seeds(&[good.addr.clone(), bare.clone()]);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].peer_id, good.peer_id);
        assert_eq!(seeds[0].dial_addr.to_string(), "/ip4/10.0.0.1/tcp/4001");
        assert_eq!(invalid, vec![bare]);
    }

    #[test]
    fn empty_seed_set_releases_immediately() {
        let barrier = BootstrapBarrier::new(&[]);
        assert!(barrier.released());
    }

    #[test]
    fn barrier_releases_after_last_resolution() {
        let (a, b) = (seed(1), seed(2));
        let mut barrier = BootstrapBarrier::new(&[a.clone(), b.clone()]);

        assert!(!barrier.released());
        assert!(barrier.is_pending(&a.peer_id));

        assert!(!barrier.resolve(&a.peer_id));
        assert!(!barrier.released());

        assert!(barrier.resolve(&b.peer_id));
        assert!(barrier.released());
    }

    #[test]
    fn double_resolution_is_inert() {
        let a = seed(1);
        let mut barrier = BootstrapBarrier::new(&[a.clone()]);

        assert!(barrier.resolve(&a.peer_id));
        assert!(!barrier.resolve(&a.peer_id));
        assert!(barrier.released());
    }

    #[test]
    fn unknown_peer_does_not_release() {
        let a = seed(1);
        let stranger = seed(2);
        let mut barrier = BootstrapBarrier::new(&[a]);

        assert!(!barrier.resolve(&stranger.peer_id));
        assert!(!barrier.released());
    }
}
