//! Snapshot comparator
//!
//! A pure function from (previous, current) to [`ChangeResult`]. Every hostname
//! present in either snapshot is visited once, in hostname order, and all
//! differences are returned together so one check produces at most one alert.

use std::collections::BTreeSet;

use crate::model::{ChangeResult, NameserverChange, ZoneSnapshot};

/// Compare a newly observed snapshot against the last known one
///
/// - `previous == None` → [`ChangeResult::Baseline`]
/// - hostname only in `current` → [`NameserverChange::Added`]
/// - hostname only in `previous` → [`NameserverChange::Removed`]
/// - hostname in both with different IPv4 or IPv6 sets → [`NameserverChange::IpChanged`]
pub fn compare(previous: Option<&ZoneSnapshot>, current: &ZoneSnapshot) -> ChangeResult {
    let Some(previous) = previous else {
        return ChangeResult::Baseline;
    };

    let hostnames: BTreeSet<&str> = previous.hostnames().chain(current.hostnames()).collect();

    let changes: Vec<NameserverChange> = hostnames
        .into_iter()
        .filter_map(|hostname| {
            match (
                previous.nameservers.get(hostname),
                current.nameservers.get(hostname),
            ) {
                (None, Some(added)) => Some(NameserverChange::Added {
                    record: added.clone(),
                }),
                (Some(removed), None) => Some(NameserverChange::Removed {
                    record: removed.clone(),
                }),
                (Some(before), Some(after)) if !before.same_addresses(after) => {
                    Some(NameserverChange::IpChanged {
                        before: before.clone(),
                        after: after.clone(),
                    })
                }
                _ => None,
            }
        })
        .collect();

    if changes.is_empty() {
        ChangeResult::NoChange
    } else {
        ChangeResult::Changed(changes)
    }
}
