//! HTTP API over the munin snapshot cache.

mod error;
mod handlers;
mod server;

pub use error::{ApiError, ErrorResponse};
pub use handlers::{
    commands_from_query, get_all, run_command, run_commands, AppState, COMMAND_PARAM,
};
pub use server::ApiServer;
