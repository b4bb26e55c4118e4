//! HTTP handlers for the munin API.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::Json;

use super::ApiError;
use crate::service::MuninService;

/// Query parameter carrying a protocol command; may repeat.
pub const COMMAND_PARAM: &str = "command";

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<MuninService>,
}

impl AppState {
    /// Create new app state around a service.
    #[must_use]
    pub fn new(service: Arc<MuninService>) -> Self {
        Self { service }
    }
}

/// Collect every `command` parameter of a query string, in order.
#[must_use]
pub fn commands_from_query(query: Option<&str>) -> Vec<String> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(key, _)| key == COMMAND_PARAM)
        .map(|(_, value)| value.into_owned())
        .collect()
}

/// GET /munin - Responses to every known command.
pub async fn get_all(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let responses = state.service.all_responses().await?;
    Ok(Json(responses))
}

/// GET /munin/runCommand - Plain-text response to the first command.
pub async fn run_command(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<String, ApiError> {
    let commands = commands_from_query(query.as_deref());
    let first = commands.into_iter().next().ok_or(ApiError::NoCommand)?;
    let mut responses = state.service.execute(&[first]).await?;
    Ok(responses.pop().unwrap_or_default())
}

/// GET /munin/runCommands - JSON array with one response per command.
pub async fn run_commands(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<String>>, ApiError> {
    let commands = commands_from_query(query.as_deref());
    let responses = state.service.execute(&commands).await?;
    Ok(Json(responses))
}
