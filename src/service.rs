//! Command dispatch against the cached snapshot.
//!
//! [`MuninService`] is the entry point used by the HTTP layer and the CLI. It
//! answers protocol commands from one consistent [`Snapshot`] in the same
//! format the munin node itself would use.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{CacheManager, Snapshot};
use crate::executor::{ExecutionError, ProtocolExecutor};
use crate::protocol::{comment, data_block, MuninCommand};

/// Answers munin protocol commands from the snapshot cache.
#[derive(Debug)]
pub struct MuninService {
    cache: CacheManager,
}

impl MuninService {
    /// Create a service on top of an existing cache.
    #[must_use]
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    /// Create a service with a default cache around `executor`.
    #[must_use]
    pub fn with_executor(executor: Arc<dyn ProtocolExecutor>) -> Self {
        Self::new(CacheManager::new(executor))
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Answer each command, in order, from one snapshot.
    ///
    /// Unknown commands and services are answered with `#` comment lines, so
    /// the result always has one entry per command.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the cache needed a refresh and it failed.
    pub async fn execute<S: AsRef<str>>(
        &self,
        commands: &[S],
    ) -> Result<Vec<String>, ExecutionError> {
        self.cache
            .with_snapshot(|snapshot| {
                commands
                    .iter()
                    .map(|c| respond(snapshot, &MuninCommand::parse(c.as_ref())))
                    .collect()
            })
            .await
    }

    /// Answer every known command, keyed and sorted by command text.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the cache needed a refresh and it failed.
    pub async fn all_responses(&self) -> Result<BTreeMap<String, String>, ExecutionError> {
        self.cache.with_snapshot(all_responses).await
    }
}

/// Format the response to one command.
#[must_use]
pub fn respond(snapshot: &Snapshot, command: &MuninCommand) -> String {
    match command {
        MuninCommand::List => list_response(snapshot),
        MuninCommand::Nodes => data_block(snapshot.node()),
        MuninCommand::Version => version_response(snapshot),
        MuninCommand::Config(service) => service_response(service, snapshot.config(service)),
        MuninCommand::Fetch(service) => service_response(service, snapshot.fetch(service)),
        MuninCommand::MissingService(_) => comment("unknown service"),
        MuninCommand::Unknown(raw) => comment(&format!("unknown command {raw}")),
    }
}

/// Build the full-state view of a snapshot.
#[must_use]
pub fn all_responses(snapshot: &Snapshot) -> BTreeMap<String, String> {
    let mut responses = BTreeMap::new();
    for command in [MuninCommand::List, MuninCommand::Nodes, MuninCommand::Version] {
        responses.insert(command.to_string(), respond(snapshot, &command));
    }
    for service in snapshot.services() {
        for command in [MuninCommand::config(service), MuninCommand::fetch(service)] {
            responses.insert(command.to_string(), respond(snapshot, &command));
        }
    }
    responses
}

fn list_response(snapshot: &Snapshot) -> String {
    format!("{}\n", snapshot.services().join(" "))
}

fn version_response(snapshot: &Snapshot) -> String {
    format!("{}\n", snapshot.version())
}

fn service_response(service: &str, data: Option<&str>) -> String {
    match data {
        Some(data) => data_block(data),
        None => comment(&format!("unknown service {service}")),
    }
}
