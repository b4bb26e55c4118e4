//! Shared test doubles for munin integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use muninlite_bridge::executor::{ExecutionError, ProcessExecutor, ProtocolExecutor};

/// Executor answering from a fixed table, with call counting and injectable
/// failures.
pub struct ScriptedExecutor {
    responses: HashMap<String, String>,
    fail_on: Mutex<Option<String>>,
    delay: Duration,
    batches: AtomicUsize,
    refreshes: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new(responses: &[(&str, &str)]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            fail_on: Mutex::new(None),
            delay: Duration::ZERO,
            batches: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// The two-service node used throughout the tests.
    pub fn two_services() -> Self {
        Self::new(&[
            ("nodes", "host1\n"),
            ("version", "1.2.3"),
            ("list", "disk cpu"),
            ("config disk", "graph_title Disk"),
            ("fetch disk", "value 42"),
            ("config cpu", "graph_title CPU"),
            ("fetch cpu", "value 7"),
        ])
    }

    /// Sleep this long inside every batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every batch containing `command` until cleared.
    pub fn fail_on(&self, command: Option<&str>) {
        *self.fail_on.lock().unwrap() = command.map(str::to_string);
    }

    /// Number of batches executed.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Number of refreshes started (batches opening with `nodes`).
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolExecutor for ScriptedExecutor {
    async fn execute(&self, commands: &[String]) -> Result<Vec<String>, ExecutionError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if commands.first().map(String::as_str) == Some("nodes") {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failing = self.fail_on.lock().unwrap().clone();
        if let Some(failing) = failing {
            if commands.iter().any(|c| *c == failing) {
                return Err(ExecutionError::IoFailure(std::io::Error::other(format!(
                    "scripted failure on {failing}"
                ))));
            }
        }

        Ok(commands
            .iter()
            .map(|c| self.responses.get(c).cloned().unwrap_or_default())
            .collect())
    }
}

/// Shell script imitating a muninlite node with `disk` and `cpu` plugins.
pub const FAKE_MUNIN: &str = r##"echo "# munin node at testhost"
while read -r cmd; do
  case "$cmd" in
    list) echo "disk cpu" ;;
    nodes) printf 'testhost\n.\n' ;;
    version) echo "munins node on testhost version: 1.2.3" ;;
    "config disk") printf 'graph_title Disk usage\ngraph_vlabel bytes\n.\n' ;;
    "config cpu") printf 'graph_title CPU usage\n.\n' ;;
    "fetch disk") printf 'used.value 42\n.\n' ;;
    "fetch cpu") printf 'user.value 7\n.\n' ;;
  esac
done
"##;

/// Write `script` into `dir` and return its path.
pub fn write_script(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("muninlite.sh");
    std::fs::write(&path, script).unwrap();
    path
}

/// Executor running `script` through `/bin/sh`.
pub fn sh_executor(script: &Path) -> ProcessExecutor {
    ProcessExecutor::new("/bin/sh").args([script.display().to_string()])
}
