//! Channel-related types and state.

use std::collections::{BTreeMap, BTreeSet};

/// An entry in a list (bans, excepts, invex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub mask: String,
    pub set_by: String,
    pub set_at: i64,
}

/// Channel topic with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// A live channel.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    /// Creation timestamp (TS), the channel's age marker.
    pub created_at: i64,
    pub topic: Option<Topic>,
    /// Flag and parameter modes, keyed by letter.
    pub(super) modes: BTreeMap<char, Option<String>>,
    /// List modes, keyed by mode name.
    pub(super) lists: BTreeMap<String, Vec<ListEntry>>,
    pub(super) members: BTreeSet<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, created_at: i64) -> Self {
        Self {
            name: name.into(),
            created_at,
            topic: None,
            modes: BTreeMap::new(),
            lists: BTreeMap::new(),
            members: BTreeSet::new(),
        }
    }

    pub fn is_mode_set(&self, letter: char) -> bool {
        self.modes.contains_key(&letter)
    }

    pub fn mode_param(&self, letter: char) -> Option<&str> {
        self.modes.get(&letter).and_then(|p| p.as_deref())
    }

    /// Entries of a list mode, oldest first.
    pub fn list(&self, mode_name: &str) -> &[ListEntry] {
        self.lists.get(mode_name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Canonical mode text, list modes excluded: `+<letters>[ <params>]`.
    ///
    /// Letters are in ascending order and parameters follow in the same
    /// order as their letters.
    pub fn mode_string(&self) -> String {
        let mut letters = String::from("+");
        let mut params = String::new();
        for (letter, param) in &self.modes {
            letters.push(*letter);
            if let Some(param) = param {
                params.push(' ');
                params.push_str(param);
            }
        }
        letters + &params
    }

    pub(super) fn add_list_entry(&mut self, mode_name: &str, entry: ListEntry) -> bool {
        let list = self.lists.entry(mode_name.to_string()).or_default();
        if list.iter().any(|e| e.mask == entry.mask) {
            return false;
        }
        list.push(entry);
        true
    }

    pub(super) fn remove_list_entry(&mut self, mode_name: &str, mask: &str) -> bool {
        let Some(list) = self.lists.get_mut(mode_name) else {
            return false;
        };
        let original_len = list.len();
        list.retain(|entry| entry.mask != mask);
        let removed = original_len != list.len();
        if list.is_empty() {
            self.lists.remove(mode_name);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_string_orders_letters_and_params() {
        let mut chan = Channel::new("#test", 1);
        assert_eq!(chan.mode_string(), "+");

        chan.modes.insert('t', None);
        chan.modes.insert('n', None);
        assert_eq!(chan.mode_string(), "+nt");

        chan.modes.insert('l', Some("25".into()));
        chan.modes.insert('k', Some("secret".into()));
        assert_eq!(chan.mode_string(), "+klnt secret 25");
    }

    #[test]
    fn list_entries_dedupe_by_mask() {
        let mut chan = Channel::new("#test", 1);
        let entry = ListEntry {
            mask: "*!*@x".into(),
            set_by: "op".into(),
            set_at: 5,
        };
        assert!(chan.add_list_entry("ban", entry.clone()));
        assert!(!chan.add_list_entry("ban", entry));
        assert_eq!(chan.list("ban").len(), 1);
        assert!(chan.remove_list_entry("ban", "*!*@x"));
        assert!(chan.list("ban").is_empty());
        assert!(!chan.remove_list_entry("ban", "*!*@x"));
    }
}
