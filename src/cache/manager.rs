//! Freshness-gated snapshot cache with single-flight refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::Snapshot;
use crate::executor::{ExecutionError, ProtocolExecutor};
use crate::protocol::MuninCommand;

/// Default freshness window of a snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Owns the current [`Snapshot`] and refreshes it through a
/// [`ProtocolExecutor`] once it is older than the TTL.
///
/// Every caller of [`CacheManager::ensure_fresh`] takes the refresh gate
/// before looking at the snapshot, so concurrent callers on a stale cache
/// trigger exactly one refresh and all see its result. The published
/// snapshot is an `Arc` swapped in one step; readers never hold a lock
/// while they use it.
pub struct CacheManager {
    executor: Arc<dyn ProtocolExecutor>,
    ttl: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
    refresh_gate: Mutex<()>,
}

impl CacheManager {
    /// Create an empty cache with the default TTL.
    #[must_use]
    pub fn new(executor: Arc<dyn ProtocolExecutor>) -> Self {
        Self::with_ttl(executor, DEFAULT_TTL)
    }

    /// Create an empty cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(executor: Arc<dyn ProtocolExecutor>, ttl: Duration) -> Self {
        Self {
            executor,
            ttl,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// The freshness window.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The published snapshot, without refreshing.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    /// Return a snapshot younger than the TTL, refreshing first if needed.
    ///
    /// # Errors
    ///
    /// Returns the executor's error if a refresh was needed and failed. The
    /// previously published snapshot, if any, stays in place.
    pub async fn ensure_fresh(&self) -> Result<Arc<Snapshot>, ExecutionError> {
        let _gate = self.refresh_gate.lock().await;

        match self.current().await {
            Some(snapshot) if !snapshot.is_stale(self.ttl) => {
                tracing::debug!(age = ?snapshot.age(), "Munin cache is up to date");
                return Ok(snapshot);
            }
            Some(previous) => tracing::info!(
                previous = %previous.updated_at().to_rfc3339(),
                "Updating Munin cache"
            ),
            None => tracing::info!("Updating Munin cache"),
        }

        let snapshot = Arc::new(self.refresh().await?);
        *self.current.write().await = Some(Arc::clone(&snapshot));
        tracing::info!(
            node = %snapshot.node(),
            version = %snapshot.version(),
            services = ?snapshot.services(),
            updated_at = %snapshot.updated_at().to_rfc3339(),
            "Updating Munin cache completed"
        );

        Ok(snapshot)
    }

    /// Run `f` against a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns the error of [`CacheManager::ensure_fresh`].
    pub async fn with_snapshot<F, R>(&self, f: F) -> Result<R, ExecutionError>
    where
        F: FnOnce(&Snapshot) -> R,
    {
        let snapshot = self.ensure_fresh().await?;
        Ok(f(&snapshot))
    }

    /// Query the node and build a complete snapshot.
    async fn refresh(&self) -> Result<Snapshot, ExecutionError> {
        let header = self
            .run(&[MuninCommand::Nodes, MuninCommand::Version, MuninCommand::List])
            .await?;
        let mut header = header.into_iter();
        let nodes = header.next().unwrap_or_default();
        let version = header.next().unwrap_or_default();
        let list = header.next().unwrap_or_default();

        let node = nodes.lines().next().unwrap_or_default().to_string();
        let services: Vec<String> = list.split_whitespace().map(str::to_string).collect();

        let config_commands: Vec<MuninCommand> =
            services.iter().map(MuninCommand::config).collect();
        let config = self.run(&config_commands).await?;

        let fetch_commands: Vec<MuninCommand> =
            services.iter().map(MuninCommand::fetch).collect();
        let fetch = self.run(&fetch_commands).await?;

        Ok(Snapshot::assemble(node, version, services, config, fetch))
    }

    async fn run(&self, commands: &[MuninCommand]) -> Result<Vec<String>, ExecutionError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let lines: Vec<String> = commands.iter().map(ToString::to_string).collect();
        self.executor.execute(&lines).await
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
