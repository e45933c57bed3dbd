//! Slack interaction callbacks
//!
//! Slack posts `application/x-www-form-urlencoded` with a single `payload`
//! field holding JSON. Only `block_actions` carrying the Resolve button are
//! of interest; everything else is ignored.

use nsmon_core::{Error, Result};
use serde::Deserialize;

use crate::message::RESOLVE_ACTION_ID;

/// A Resolve button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveAction {
    /// Resolution reference (history entry id)
    pub reference: String,
    /// Who pressed the button
    pub actor: String,
}

#[derive(Debug, Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    user: Option<SlackUser>,
    #[serde(default)]
    actions: Vec<SlackAction>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackAction {
    #[serde(default)]
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

impl SlackUser {
    fn display(&self) -> Option<String> {
        [&self.username, &self.name, &self.id]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.trim().is_empty())
            .cloned()
    }
}

/// Parse the JSON in an interaction callback's `payload` field
///
/// # Returns
///
/// - `Ok(Some(action))`: The Resolve button was pressed
/// - `Ok(None)`: A well-formed callback for something else
/// - `Err(Error::InvalidInput)`: Not a Slack interaction payload
pub fn parse_interaction(payload: &str) -> Result<Option<ResolveAction>> {
    let payload: InteractionPayload = serde_json::from_str(payload)
        .map_err(|e| Error::invalid_input(format!("Malformed interaction payload: {}", e)))?;

    if payload.kind != "block_actions" {
        tracing::debug!(kind = %payload.kind, "Ignoring Slack interaction");
        return Ok(None);
    }

    let Some(reference) = payload
        .actions
        .into_iter()
        .find(|action| action.action_id == RESOLVE_ACTION_ID)
        .and_then(|action| action.value)
    else {
        return Ok(None);
    };

    let actor = payload
        .user
        .as_ref()
        .and_then(SlackUser::display)
        .unwrap_or_default();

    Ok(Some(ResolveAction { reference, actor }))
}
