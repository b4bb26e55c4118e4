//! Munin node protocol commands.
//!
//! Commands arrive as raw strings (from the HTTP layer or the CLI) and are
//! parsed once into [`MuninCommand`]. Everything downstream matches on the
//! enum instead of inspecting string prefixes.

use std::fmt;

/// Prefix reserved by the protocol for diagnostic lines.
pub const COMMENT_PREFIX: &str = "# ";

/// Line terminating a multi-line data block.
pub const DATA_TERMINATOR: &str = "\n.\n";

/// A single command of the munin node protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MuninCommand {
    /// List the plugins (services) of the node.
    List,
    /// Report the node name.
    Nodes,
    /// Report the node software version.
    Version,
    /// Graph configuration for one service.
    Config(String),
    /// Current values for one service.
    Fetch(String),
    /// `config` or `fetch` without a service argument, kept verbatim.
    MissingService(String),
    /// Anything outside the supported command set, kept verbatim.
    Unknown(String),
}

impl MuninCommand {
    /// Parse a raw command line.
    ///
    /// Surrounding whitespace (including a trailing newline) is ignored. The
    /// service argument of `config`/`fetch` is everything after the first
    /// space.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (head, argument) = match trimmed.split_once(' ') {
            Some((head, rest)) => (head, Some(rest.trim())),
            None => (trimmed, None),
        };

        match (head, argument) {
            ("list", None) => Self::List,
            ("nodes", None) => Self::Nodes,
            ("version", None) => Self::Version,
            ("config" | "fetch", None | Some("")) => Self::MissingService(raw.to_string()),
            ("config", Some(service)) => Self::Config(service.to_string()),
            ("fetch", Some(service)) => Self::Fetch(service.to_string()),
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// Build a `config <service>` command.
    #[must_use]
    pub fn config(service: impl Into<String>) -> Self {
        Self::Config(service.into())
    }

    /// Build a `fetch <service>` command.
    #[must_use]
    pub fn fetch(service: impl Into<String>) -> Self {
        Self::Fetch(service.into())
    }
}

impl fmt::Display for MuninCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("list"),
            Self::Nodes => f.write_str("nodes"),
            Self::Version => f.write_str("version"),
            Self::Config(service) => write!(f, "config {service}"),
            Self::Fetch(service) => write!(f, "fetch {service}"),
            Self::MissingService(raw) | Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Format a value as a data block: the value followed by a `.` line.
#[must_use]
pub fn data_block(data: &str) -> String {
    format!("{data}{DATA_TERMINATOR}")
}

/// Format a protocol comment line.
#[must_use]
pub fn comment(message: &str) -> String {
    format!("{COMMENT_PREFIX}{message}")
}
