//! Munin node protocol: command parsing and transcript framing.

mod command;
mod framing;

pub use command::*;
pub use framing::*;
