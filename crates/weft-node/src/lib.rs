//! Per-node composition root.
//!
//! A [`NodeContext`] owns one node's entire stack: the link multiplexer,
//! the lazily resolved local identity, the neighbor service, the reactive
//! router, and the tunnel that carries trusted-transport datagrams across
//! the mesh. Configuration is a TOML file; logging is `tracing` with an
//! env-filter. There are no globals; two contexts in one process are two
//! independent nodes, which is how the integration tests run whole meshes.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod tunnel;

pub use config::NodeConfig;
pub use context::NodeContext;
pub use error::{ConfigError, NodeStartError, StreamError};
