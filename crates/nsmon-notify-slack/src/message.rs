//! Block Kit rendering
//!
//! Alerts are sent as one attachment (for the priority color bar) holding
//! the blocks: header, zone facts, one section per changed nameserver with
//! its before/after addresses, and the Resolve button.

use nsmon_core::model::{AlertPayload, HistoryEntry, NameserverChange, NameserverRecord};
use nsmon_core::Priority;
use serde_json::{Value, json};

/// `action_id` of the Resolve button
pub const RESOLVE_ACTION_ID: &str = "resolve_nameserver_change";

/// Attachment color bar per priority
pub fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "#439FE0",
        Priority::Medium => "#ECB22E",
        Priority::High => "#E01E5A",
        Priority::Critical => "#8B0000",
    }
}

fn addresses(record: Option<&NameserverRecord>) -> String {
    match record {
        Some(record) => format!("`{}`", record.format_addresses()),
        None => "_(not delegated)_".to_string(),
    }
}

fn change_section(change: &NameserverChange) -> Value {
    let (label, before, after) = match change {
        NameserverChange::Added { record } => ("Nameserver added", None, Some(record)),
        NameserverChange::Removed { record } => ("Nameserver removed", Some(record), None),
        NameserverChange::IpChanged { before, after } => {
            ("IP address changed", Some(before), Some(after))
        }
    };

    json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": format!("*{}*: `{}`", label, change.hostname()),
        },
        "fields": [
            {"type": "mrkdwn", "text": format!("*Before*\n{}", addresses(before))},
            {"type": "mrkdwn", "text": format!("*After*\n{}", addresses(after))},
        ],
    })
}

/// Render a change alert
pub fn alert_message(payload: &AlertPayload) -> Value {
    let detected = payload.detected_at.format("%Y-%m-%d %H:%M:%S UTC");
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": "Nameserver change detected"},
        }),
        json!({
            "type": "section",
            "fields": [
                {"type": "mrkdwn", "text": format!("*Domain*\n{}", payload.zone)},
                {"type": "mrkdwn", "text": format!("*Detected*\n{}", detected)},
                {"type": "mrkdwn", "text": format!("*Environment*\n{}", payload.environment)},
                {"type": "mrkdwn", "text": format!("*Priority*\n{}", payload.priority)},
            ],
        }),
    ];

    if !payload.description.is_empty() {
        blocks.push(json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": payload.description}],
        }));
    }

    blocks.push(json!({"type": "divider"}));
    blocks.extend(payload.changes.iter().map(change_section));
    blocks.push(json!({
        "type": "actions",
        "elements": [{
            "type": "button",
            "text": {"type": "plain_text", "text": "Resolve"},
            "style": "primary",
            "action_id": RESOLVE_ACTION_ID,
            "value": payload.resolution_reference,
        }],
    }));

    json!({
        "text": format!("Nameserver change detected for {}: {}", payload.zone, payload.summary),
        "attachments": [{
            "color": priority_color(payload.priority),
            "blocks": blocks,
        }],
    })
}

/// Render the follow-up posted once a change is acknowledged
pub fn resolution_message(entry: &HistoryEntry, actor: &str) -> Value {
    let text = format!(
        ":white_check_mark: Nameserver change for *{}* resolved by *{}*",
        entry.zone, actor
    );
    json!({
        "text": text,
        "blocks": [
            {"type": "section", "text": {"type": "mrkdwn", "text": text}},
            {
                "type": "context",
                "elements": [{"type": "mrkdwn", "text": entry.description}],
            },
        ],
    })
}
