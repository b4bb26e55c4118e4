//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;
use crate::executor::{DEFAULT_BINARY_PATH, DEFAULT_TIMEOUT};

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for running the muninlite binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuninConfig {
    /// Path the binary is run from.
    pub binary: PathBuf,
    /// Extra arguments, e.g. a script path when `binary` is an interpreter.
    pub args: Vec<String>,
    /// Install location to copy the binary from when `binary` is missing.
    pub source: Option<PathBuf>,
    /// Upper bound for one batch, in seconds.
    pub timeout_secs: u64,
}

impl MuninConfig {
    /// Batch timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MuninConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY_PATH),
            args: Vec::new(),
            source: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Configuration for the snapshot cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window, in seconds.
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Freshness window as a `Duration`.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to enable permissive CORS.
    pub cors_permissive: bool,
}

impl ServerConfig {
    /// The configured address as `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            cors_permissive: false,
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub munin: MuninConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}
