//! `[[permchannels]]` config blocks as snapshot records.

use super::codec::{ChannelRecord, ListModeEntries, parse_list_entries};
use crate::config::PermChannelBlock;
use tracing::warn;

/// Turn a config block into a record for the normal load path.
pub fn seed_record(block: &PermChannelBlock) -> ChannelRecord {
    let mut dropped_list_entries = 0;
    let lists = block
        .lists
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_suffix("list").filter(|n| !n.is_empty())?;
            let Some(text) = value.as_str() else {
                warn!(channel = %block.channel, key = %key, "List value is not a string");
                return None;
            };
            let (entries, dropped) = parse_list_entries(&block.channel, name, text);
            dropped_list_entries += dropped;
            Some(ListModeEntries {
                name: name.to_string(),
                letter: None,
                entries,
            })
        })
        .collect();

    ChannelRecord {
        name: block.channel.clone(),
        created_at: block.ts,
        topic: block.topic.clone(),
        topic_set_at: block.topicts,
        topic_set_by: block.topicsetby.clone(),
        modes: block.modes.clone(),
        lists,
        dropped_list_entries,
    }
}
