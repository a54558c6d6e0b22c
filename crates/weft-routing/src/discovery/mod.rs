//! Reactive route discovery: bounded flooding with a learned-route cache.

pub mod cache;
pub mod constants;
pub mod frame;
pub mod frame_id;
pub mod request;
pub mod service;

pub use cache::{CachedRoute, RouteCache};
pub use constants::*;
pub use frame::{DiscoveryCommon, DiscoveryFrame, ReplyExtra, RequestKind};
pub use frame_id::FrameIdCache;
pub use request::{GatewayResolution, RequestStore};
pub use service::{DiscoveryConfig, ReactiveRouter};
