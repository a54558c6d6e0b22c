//! TOML-based node configuration.

use std::net::{SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use weft_core::Address;
use weft_routing::discovery::DiscoveryConfig;
use weft_routing::neighbor::NeighborTimers;

use crate::error::ConfigError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub timers: TimersSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub media: MediaSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    #[must_use]
    pub fn neighbor_timers(&self) -> NeighborTimers {
        NeighborTimers {
            expiration: Duration::from_secs(self.timers.neighbor_expiration_secs),
            hello_interval: Duration::from_secs(self.timers.hello_interval_secs),
        }
    }

    #[must_use]
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            first_response_timeout: Duration::from_millis(
                self.discovery.first_response_timeout_ms,
            ),
            better_response_grace: Duration::from_millis(
                self.discovery.better_response_grace_ms,
            ),
            route_ttl: Duration::from_secs(self.discovery.route_ttl_secs),
            route_capacity: self.discovery.route_capacity,
            replay_capacity: self.discovery.replay_capacity,
        }
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// This node's own processing cost, added to every path through it.
    #[serde(default)]
    pub cost: u16,
    /// Forced identity, e.g. `"serial:7"`. Defaults to the first local
    /// link address to appear.
    pub address: Option<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self { cost: 0, address: None }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// The `[timers]` section, in whole seconds.
#[derive(Debug, Deserialize)]
pub struct TimersSection {
    #[serde(default = "default_neighbor_expiration_secs")]
    pub neighbor_expiration_secs: u64,
    #[serde(default = "default_hello_interval_secs")]
    pub hello_interval_secs: u64,
}

fn default_neighbor_expiration_secs() -> u64 {
    10
}

fn default_hello_interval_secs() -> u64 {
    4
}

impl Default for TimersSection {
    fn default() -> Self {
        Self {
            neighbor_expiration_secs: default_neighbor_expiration_secs(),
            hello_interval_secs: default_hello_interval_secs(),
        }
    }
}

/// The `[discovery]` section.
#[derive(Debug, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_first_response_timeout_ms")]
    pub first_response_timeout_ms: u64,
    #[serde(default = "default_better_response_grace_ms")]
    pub better_response_grace_ms: u64,
    #[serde(default = "default_route_ttl_secs")]
    pub route_ttl_secs: u64,
    #[serde(default = "default_route_capacity")]
    pub route_capacity: usize,
    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,
}

fn default_first_response_timeout_ms() -> u64 {
    3000
}

fn default_better_response_grace_ms() -> u64 {
    1000
}

fn default_route_ttl_secs() -> u64 {
    30
}

fn default_route_capacity() -> usize {
    64
}

fn default_replay_capacity() -> usize {
    128
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            first_response_timeout_ms: default_first_response_timeout_ms(),
            better_response_grace_ms: default_better_response_grace_ms(),
            route_ttl_secs: default_route_ttl_secs(),
            route_capacity: default_route_capacity(),
            replay_capacity: default_replay_capacity(),
        }
    }
}

/// The `[media]` section containing arrays of media configs.
#[derive(Debug, Default, Deserialize)]
pub struct MediaSection {
    #[serde(default)]
    pub udp: Vec<UdpEntry>,
}

/// A `[[media.udp]]` entry.
#[derive(Debug, Deserialize)]
pub struct UdpEntry {
    pub name: String,
    pub bind: String,
    /// Where link-level broadcasts go; omitted disables broadcast.
    pub broadcast_target: Option<String>,
}

/// Parse an address string like `"serial:7"` or `"udp:10.0.0.1:9104"`.
pub fn parse_address(s: &str) -> Result<Address, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid { field: "address", message };
    let (scheme, rest) = s
        .split_once(':')
        .ok_or_else(|| invalid(format!("'{s}' has no scheme prefix")))?;
    match scheme {
        "serial" | "uhf" => {
            let byte: u8 = rest
                .parse()
                .map_err(|_| invalid(format!("'{rest}' is not a byte")))?;
            Ok(if scheme == "serial" {
                Address::Serial(byte)
            } else {
                Address::Uhf(byte)
            })
        }
        "udp" | "websocket" => {
            let target: SocketAddrV4 = rest
                .parse()
                .map_err(|_| invalid(format!("'{rest}' is not an IPv4 address:port")))?;
            Ok(if scheme == "udp" {
                Address::Udp(*target.ip(), target.port())
            } else {
                Address::WebSocket(*target.ip(), target.port())
            })
        }
        other => Err(invalid(format!("unknown address scheme '{other}'"))),
    }
}

/// Parse a socket address string like `"0.0.0.0:9104"`.
pub fn parse_socket_addr(field: &'static str, s: &str) -> Result<SocketAddr, ConfigError> {
    s.parse().map_err(|_| ConfigError::Invalid {
        field,
        message: format!("'{s}' is not a socket address"),
    })
}

/// Parse an IPv4 socket address string, for broadcast targets.
pub fn parse_socket_addr_v4(
    field: &'static str,
    s: &str,
) -> Result<SocketAddrV4, ConfigError> {
    s.parse().map_err(|_| ConfigError::Invalid {
        field,
        message: format!("'{s}' is not an IPv4 socket address"),
    })
}
