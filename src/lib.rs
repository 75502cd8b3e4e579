//! Fetch gateway library.
//!
//! A supervised pool of workers serving a single-operation RPC endpoint
//! (`getURLContents`) with per-source rate bans and demand-driven pool sizing.

pub mod config;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;
pub mod security;
pub mod supervisor;
pub mod worker;

pub use config::GatewayConfig;
pub use lifecycle::{Shutdown, ShutdownSignal};
pub use supervisor::{GatewayError, PoolStatus, Supervisor};
