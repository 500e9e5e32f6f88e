//! Moving channel state between the live registry and snapshot records.

use super::codec::{ChannelRecord, ListModeEntries};
use super::marker::PermanentMode;
use crate::error::LoadError;
use crate::state::{ChannelRegistry, ModeChange, ModeSource};
use tracing::{debug, warn};

/// Collect a record for every live channel carrying `+P`.
pub fn gather_durable(
    registry: &ChannelRegistry,
    marker: &PermanentMode,
    list_modes: bool,
) -> Vec<ChannelRecord> {
    registry
        .channels()
        .filter(|chan| marker.is_set(chan))
        .map(|chan| {
            let lists = if list_modes {
                registry
                    .modes()
                    .list_modes()
                    .filter(|spec| !chan.list(&spec.name).is_empty())
                    .map(|spec| ListModeEntries {
                        name: spec.name.clone(),
                        letter: Some(spec.letter),
                        entries: chan.list(&spec.name).to_vec(),
                    })
                    .collect()
            } else {
                Vec::new()
            };

            ChannelRecord {
                name: chan.name.clone(),
                created_at: Some(chan.created_at),
                topic: chan.topic.as_ref().map(|t| t.text.clone()),
                topic_set_at: chan.topic.as_ref().map(|t| t.set_at),
                topic_set_by: chan.topic.as_ref().map(|t| t.set_by.clone()),
                modes: chan.mode_string(),
                lists,
                dropped_list_entries: 0,
            }
        })
        .collect()
}

/// What [`apply_record`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new channel was created. `skipped` counts items that could not be
    /// applied (unknown mode letters, missing parameters, refused changes).
    Created { skipped: usize },
    /// A live channel already had this name; nothing was touched.
    AlreadyLive,
}

/// Totals for one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub created: usize,
    pub already_live: usize,
    pub rejected: usize,
    pub skipped_items: usize,
}

impl LoadReport {
    pub fn merge(&mut self, other: LoadReport) {
        self.created += other.created;
        self.already_live += other.already_live;
        self.rejected += other.rejected;
        self.skipped_items += other.skipped_items;
    }
}

/// Recreate one channel from a record.
///
/// Existing live channels always win: a record whose name is already live
/// is ignored. `now` substitutes for a missing creation or topic time.
pub fn apply_record(
    record: &ChannelRecord,
    registry: &mut ChannelRegistry,
    marker: &PermanentMode,
    now: i64,
) -> Result<ApplyOutcome, LoadError> {
    let name = record.name.as_str();
    if !crate::state::is_channel_name(name) {
        return Err(LoadError::InvalidName(record.name.clone()));
    }
    if registry.find(name).is_some() {
        debug!(channel = %name, "Channel already live, skipping record");
        return Ok(ApplyOutcome::AlreadyLive);
    }

    let created_at = record.created_at.filter(|ts| *ts >= 1).unwrap_or(now);
    registry
        .create(name, created_at)
        .map_err(|_| LoadError::InvalidName(record.name.clone()))?;

    let topic = record.topic.as_deref().unwrap_or_default();
    let topic_set_at = record.topic_set_at.filter(|ts| *ts != 0);
    if !topic.is_empty() || topic_set_at.is_some() {
        let set_by = record
            .topic_set_by
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(registry.server_name())
            .to_string();
        if let Err(e) = registry.set_topic(name, topic, &set_by, topic_set_at.unwrap_or(now)) {
            warn!(channel = %name, error = %e, "Failed to restore topic");
        }
    }

    let mut skipped = apply_mode_string(record, registry);
    skipped += apply_list_entries(record, registry);
    skipped += record.dropped_list_entries;

    // Always mark replayed channels permanent, recorded or not.
    if let Err(e) = registry.apply_mode(&ModeSource::Server, name, ModeChange::add(marker.letter())) {
        warn!(channel = %name, error = %e, "Failed to set permanent mode");
        skipped += 1;
    }

    debug!(channel = %name, skipped, "Restored permanent channel");
    Ok(ApplyOutcome::Created { skipped })
}

/// Replay `+letters params...`. Letters that take a parameter consume the
/// next token in order.
fn apply_mode_string(record: &ChannelRecord, registry: &mut ChannelRegistry) -> usize {
    let name = record.name.as_str();
    let mut tokens = record.modes.split_whitespace();
    let Some(letters) = tokens.next() else {
        return 0;
    };

    let mut skipped = 0;
    for letter in letters.chars().filter(|c| *c != '+' && *c != '-') {
        let Some(spec) = registry.modes().find(letter).cloned() else {
            let e = LoadError::UnresolvableMode {
                channel: name.to_string(),
                letter,
            };
            warn!(error = %e, "Skipping unknown mode");
            skipped += 1;
            continue;
        };

        let mut change = ModeChange::add(letter);
        if spec.needs_param(true) {
            let Some(param) = tokens.next() else {
                warn!(channel = %name, mode = %letter, "Mode parameter missing");
                skipped += 1;
                continue;
            };
            change = change.with_param(param);
        }

        if let Err(e) = registry.apply_mode(&ModeSource::Server, name, change) {
            warn!(channel = %name, mode = %letter, error = %e, "Failed to restore mode");
            skipped += 1;
        }
    }
    skipped
}

/// Replay `<name>list` entries for every list mode the registry knows.
fn apply_list_entries(record: &ChannelRecord, registry: &mut ChannelRegistry) -> usize {
    let name = record.name.as_str();
    for list in &record.lists {
        if registry.modes().find_by_name(&list.name).is_none_or(|s| !s.is_list()) {
            debug!(channel = %name, list = %list.name, "Ignoring unknown list mode");
        }
    }

    let specs: Vec<_> = registry.modes().list_modes().cloned().collect();
    let mut skipped = 0;
    for spec in specs {
        let Some(entries) = record.list(&spec.name) else {
            continue;
        };
        for entry in entries {
            let change = ModeChange::add(spec.letter)
                .with_param(entry.mask.clone())
                .with_origin(entry.set_by.clone(), entry.set_at);
            if let Err(e) = registry.apply_mode(&ModeSource::Server, name, change) {
                warn!(channel = %name, mask = %entry.mask, error = %e, "Failed to restore list entry");
                skipped += 1;
            }
        }
    }
    skipped
}

/// Apply every record, logging and counting failures instead of stopping.
pub fn load_records(
    records: &[ChannelRecord],
    registry: &mut ChannelRegistry,
    marker: &PermanentMode,
    now: i64,
) -> LoadReport {
    let mut report = LoadReport::default();
    for record in records {
        match apply_record(record, registry, marker, now) {
            Ok(ApplyOutcome::Created { skipped }) => {
                report.created += 1;
                report.skipped_items += skipped;
                crate::metrics::record_channel_loaded();
                crate::metrics::record_dropped_list_entries(record.dropped_list_entries);
            }
            Ok(ApplyOutcome::AlreadyLive) => report.already_live += 1,
            Err(e) => {
                warn!(error = %e, "Ignoring permanent channel record");
                crate::metrics::record_load_error(&e);
                report.rejected += 1;
            }
        }
    }
    report
}
