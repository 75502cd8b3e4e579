//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the fetch gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Worker pool sizing and autoscaling.
    pub pool: PoolConfig,

    /// Per-source rate tracking and ban settings.
    pub bans: BanConfig,

    /// Outbound fetch limits.
    pub fetch: FetchConfig,

    /// Per-request session limits.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections across all workers (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Floor for the pool. Defaults to the available CPU parallelism.
    pub min_workers: Option<usize>,

    /// Hard ceiling for the pool.
    pub max_workers: usize,

    /// Slack allowed on top of observed demand before the pool counts as
    /// over-allocated, as a percentage of requests per second.
    pub extra_allocation_percent: u32,

    /// Consecutive over-allocated ticks required before one worker is stopped.
    pub over_allocation_streak_threshold: u32,

    /// Autoscaler tick interval in milliseconds.
    pub autoscale_interval_ms: u64,

    /// How long a stopping worker may spend draining its connections.
    pub drain_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: None,
            max_workers: 100,
            extra_allocation_percent: 10,
            over_allocation_streak_threshold: 8,
            autoscale_interval_ms: 100,
            drain_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    /// Resolve the pool floor, falling back to available parallelism.
    pub fn resolved_min_workers(&self) -> usize {
        self.min_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(self.max_workers.max(1))
        })
    }
}

/// Ban list configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BanConfig {
    /// Requests a single source may make within one second before it is banned.
    pub requests_per_source_per_second: u32,

    /// How long a ban lasts, in seconds.
    pub ban_duration_secs: u64,

    /// How often the supervisor pushes the ban snapshot to workers.
    pub propagation_interval_ms: u64,

    /// How often expired bans are swept from the table.
    pub expiry_interval_secs: u64,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            requests_per_source_per_second: 5,
            ban_duration_secs: 60,
            propagation_interval_ms: 300,
            expiry_interval_secs: 60,
        }
    }
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total deadline for one fetch (connect + headers + body) in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Largest response body the gateway will buffer.
    pub max_body_bytes: usize,

    /// Refuse targets that resolve to loopback or private literal addresses.
    pub block_private_networks: bool,

    /// User-Agent sent to fetch targets.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 5,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            block_private_networks: false,
            user_agent: concat!("fetch-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Per-request session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on the life of one session; past it the caller gets a 500.
    pub deadline_secs: u64,

    /// Largest urlencoded request body accepted.
    pub max_request_body_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            max_request_body_bytes: 64 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
