//! Immutable record of one full refresh.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Everything the munin node reported during one refresh.
///
/// A `Snapshot` is only ever built complete and is never mutated afterwards;
/// the cache replaces it wholesale.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// When the snapshot was built.
    updated_at: DateTime<Utc>,
    refreshed_at: Instant,
    node: String,
    version: String,
    services: Vec<String>,
    config_data: HashMap<String, String>,
    fetch_data: HashMap<String, String>,
}

impl Snapshot {
    /// Assemble a snapshot from the responses of a refresh.
    ///
    /// `config` and `fetch` hold one response per entry of `services`, in the
    /// same order. Missing trailing responses are stored as empty strings so
    /// every service has both entries.
    #[must_use]
    pub fn assemble(
        node: impl Into<String>,
        version: impl Into<String>,
        services: Vec<String>,
        config: Vec<String>,
        fetch: Vec<String>,
    ) -> Self {
        let mut config = config.into_iter();
        let mut fetch = fetch.into_iter();
        let mut config_data = HashMap::with_capacity(services.len());
        let mut fetch_data = HashMap::with_capacity(services.len());

        for service in &services {
            config_data.insert(service.clone(), config.next().unwrap_or_default());
            fetch_data.insert(service.clone(), fetch.next().unwrap_or_default());
        }

        Self {
            updated_at: Utc::now(),
            refreshed_at: Instant::now(),
            node: node.into(),
            version: version.into(),
            services,
            config_data,
            fetch_data,
        }
    }

    /// Wall-clock creation time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Node name.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Node software version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Services in the order reported by `list`.
    #[must_use]
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Raw config block of a service.
    #[must_use]
    pub fn config(&self, service: &str) -> Option<&str> {
        self.config_data.get(service).map(String::as_str)
    }

    /// Raw fetch block of a service.
    #[must_use]
    pub fn fetch(&self, service: &str) -> Option<&str> {
        self.fetch_data.get(service).map(String::as_str)
    }

    /// Time since the snapshot was built.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }

    /// Whether the snapshot is at least `ttl` old.
    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}
