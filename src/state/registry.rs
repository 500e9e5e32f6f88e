//! The channel registry and its observer hooks.
//!
//! Owns every live channel plus the mode registry. Observers see mode
//! changes before they are applied, topic changes after, and get a veto
//! over channel destruction.

use super::channel::{Channel, ListEntry, Topic};
use super::modes::{ModeChange, ModeKind, ModeRegistry, ModeSource, ModeSpec};
use super::names::{irc_to_lower, is_channel_name};
use crate::error::ChannelError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a pre-delete hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDecision {
    Allow,
    Deny,
}

/// Hooks into channel state changes.
///
/// All methods have no-op defaults.
pub trait ChannelObserver: Send + Sync {
    /// Called for every validated mode change, before it is applied.
    fn on_raw_mode(&self, _channel: &Channel, _change: &ModeChange) {}

    /// Called after a topic has been set or cleared.
    fn on_post_topic_change(&self, _channel: &Channel) {}

    /// Called before a channel is destroyed. Any `Deny` keeps it alive.
    fn on_pre_delete(&self, _channel: &Channel) -> DeleteDecision {
        DeleteDecision::Allow
    }
}

/// All live channels, indexed by case-folded name.
pub struct ChannelRegistry {
    server_name: String,
    modes: ModeRegistry,
    channels: BTreeMap<String, Channel>,
    observers: Vec<Arc<dyn ChannelObserver>>,
}

impl ChannelRegistry {
    pub fn new(server_name: impl Into<String>, modes: ModeRegistry) -> Self {
        Self {
            server_name: server_name.into(),
            modes,
            channels: BTreeMap::new(),
            observers: Vec::new(),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    /// Register an additional mode (e.g. `+P`).
    pub fn register_mode(&mut self, spec: ModeSpec) -> Result<(), ChannelError> {
        self.modes.register(spec)
    }

    pub fn set_oper_only(&mut self, letter: char, oper_only: bool) -> bool {
        self.modes.set_oper_only(letter, oper_only)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ChannelObserver>) {
        self.observers.push(observer);
    }

    pub fn find(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&irc_to_lower(name))
    }

    /// Live channels in case-folded name order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Create an empty channel with the given creation timestamp.
    pub fn create(&mut self, name: &str, created_at: i64) -> Result<&Channel, ChannelError> {
        if !is_channel_name(name) {
            return Err(ChannelError::InvalidName(name.to_string()));
        }
        let key = irc_to_lower(name);
        if self.channels.contains_key(&key) {
            return Err(ChannelError::ChannelExists(name.to_string()));
        }
        debug!(channel = %name, ts = created_at, "Channel created");
        Ok(self
            .channels
            .entry(key)
            .or_insert_with(|| Channel::new(name, created_at)))
    }

    /// Add a member, creating the channel if needed.
    pub fn join(&mut self, name: &str, nick: &str) -> Result<(), ChannelError> {
        if self.find(name).is_none() {
            self.create(name, Utc::now().timestamp())?;
        }
        let chan = self
            .channels
            .get_mut(&irc_to_lower(name))
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        chan.members.insert(nick.to_string());
        Ok(())
    }

    /// Remove a member. Returns whether the channel still exists afterwards.
    pub fn part(&mut self, name: &str, nick: &str) -> Result<bool, ChannelError> {
        let key = irc_to_lower(name);
        let chan = self
            .channels
            .get_mut(&key)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        chan.members.remove(nick);
        Ok(!self.check_destroy(&key))
    }

    /// Validate and apply one mode change. Returns whether state changed.
    pub fn apply_mode(
        &mut self,
        source: &ModeSource,
        name: &str,
        change: ModeChange,
    ) -> Result<bool, ChannelError> {
        let spec = self
            .modes
            .find(change.letter)
            .cloned()
            .ok_or(ChannelError::UnknownMode(change.letter))?;
        if spec.oper_only && !source.is_privileged() {
            return Err(ChannelError::OperOnly(spec.letter));
        }
        if spec.needs_param(change.adding) && change.param.is_none() {
            return Err(ChannelError::NeedsParam(spec.letter));
        }

        let key = irc_to_lower(name);
        let chan = self
            .channels
            .get_mut(&key)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;

        for observer in &self.observers {
            observer.on_raw_mode(chan, &change);
        }

        let changed = match spec.kind {
            ModeKind::Flag if change.adding => chan.modes.insert(spec.letter, None).is_none(),
            ModeKind::Param if change.adding => {
                let old = chan.modes.insert(spec.letter, change.param.clone());
                old != Some(change.param)
            }
            ModeKind::Flag | ModeKind::Param => chan.modes.remove(&spec.letter).is_some(),
            ModeKind::List => {
                let mask = change.param.unwrap_or_default();
                if change.adding {
                    let entry = ListEntry {
                        mask,
                        set_by: change.set_by.unwrap_or_else(|| {
                            source.display_name(&self.server_name).to_string()
                        }),
                        set_at: change.set_at.unwrap_or_else(|| Utc::now().timestamp()),
                    };
                    chan.add_list_entry(&spec.name, entry)
                } else {
                    chan.remove_list_entry(&spec.name, &mask)
                }
            }
        };

        if changed && !change.adding {
            self.check_destroy(&key);
        }
        Ok(changed)
    }

    /// Set or clear (empty text) a channel topic.
    pub fn set_topic(
        &mut self,
        name: &str,
        text: &str,
        set_by: &str,
        set_at: i64,
    ) -> Result<(), ChannelError> {
        let chan = self
            .channels
            .get_mut(&irc_to_lower(name))
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        chan.topic = (!text.is_empty()).then(|| Topic {
            text: text.to_string(),
            set_by: set_by.to_string(),
            set_at,
        });
        for observer in &self.observers {
            observer.on_post_topic_change(chan);
        }
        Ok(())
    }

    /// External delete request (services drop, oper clear). Observers may deny.
    pub fn request_delete(&mut self, name: &str) -> Result<(), ChannelError> {
        let key = irc_to_lower(name);
        let chan = self
            .channels
            .get(&key)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        if self.delete_denied(chan) {
            return Err(ChannelError::DeleteDenied(chan.name.clone()));
        }
        self.channels.remove(&key);
        Ok(())
    }

    /// Destroy an empty channel unless an observer objects.
    fn check_destroy(&mut self, key: &str) -> bool {
        let Some(chan) = self.channels.get(key) else {
            return true;
        };
        if chan.member_count() > 0 || self.delete_denied(chan) {
            return false;
        }
        debug!(channel = %chan.name, "Destroying empty channel");
        self.channels.remove(key);
        true
    }

    fn delete_denied(&self, chan: &Channel) -> bool {
        self.observers
            .iter()
            .any(|o| o.on_pre_delete(chan) == DeleteDecision::Deny)
    }
}
