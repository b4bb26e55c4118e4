//! muninlite-bridge - Cached HTTP bridge to a local muninlite node.

pub mod api;
pub mod cache;
pub mod config;
pub mod deploy;
pub mod executor;
pub mod protocol;
pub mod service;
