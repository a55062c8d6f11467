//! CLI argument parsing (manual, no clap dependency).

use libp2p::Multiaddr;

use meshchat_network::config::NetworkConfig;

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub listen_addr: Option<String>,
    pub bootstrap_nodes: Vec<String>,
    pub discovery_interval: Option<u64>,
}

impl CliArgs {
    /// Parses CLI arguments from `std::env::args`.
    pub fn parse_from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    fn parse(args: impl Iterator<Item = String>) -> Self {
        let args: Vec<String> = args.collect();
        let mut cli = Self::default();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--listen" => {
                    i += 1;
                    cli.listen_addr = args.get(i).cloned();
                }
                "--bootstrap" => {
                    i += 1;
                    if let Some(addr) = args.get(i) {
                        cli.bootstrap_nodes.push(addr.clone());
                    }
                }
                "--discovery-interval" => {
                    i += 1;
                    cli.discovery_interval = args.get(i).and_then(|s| s.parse().ok());
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("unknown argument: {other}");
                    eprintln!("use --help for usage information");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        cli
    }

    /// Resolves the arguments into a [`NetworkConfig`].
    ///
    /// Flags override the defaults; omitted flags keep them. With no
    /// `--bootstrap` flags the well-known public seeds are used.
    pub fn into_network_config(self) -> Result<NetworkConfig, String> {
        let mut config = NetworkConfig::default();

        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr
                .parse::<Multiaddr>()
                .map_err(|e| format!("invalid listen address '{addr}': {e}"))?;
        }

        if !self.bootstrap_nodes.is_empty() {
            config.bootstrap_nodes = self
                .bootstrap_nodes
                .iter()
                .map(|s| {
                    s.parse::<Multiaddr>()
                        .map_err(|e| format!("invalid bootstrap address '{s}': {e}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
        }

        if let Some(secs) = self.discovery_interval {
            config.discovery_interval_secs = secs;
        }

        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn print_help() {
    println!(
        r#"meshchat - P2P chat node

USAGE:
    meshchat [OPTIONS]

OPTIONS:
    --listen <MULTIADDR>         Listen address (default: /ip4/0.0.0.0/tcp/0)
    --bootstrap <MULTIADDR>      Add a bootstrap seed (repeatable; replaces
                                 the default public seeds)
    --discovery-interval <SECS>  Seconds between peer lookups (default: 30)
    -h, --help                   Show this help

PROTOCOL:
    Events are written to stdout, one JSON object per line.
    Commands are read from stdin:
        connect <multiaddr>      Dial a peer (address must include /p2p/...)
        send <message>           Publish a chat message

ENVIRONMENT:
    RUST_LOG                     Log level filter for stderr diagnostics
"#
    );
}
