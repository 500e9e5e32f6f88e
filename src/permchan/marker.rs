//! The permanent channel mode (`+P`) and the dirty flag it feeds.
//!
//! The flush scheduler owns the [`DirtyFlag`]; the registry only ever sees a
//! [`PermanenceHooks`] observer holding a clone of it.

use crate::state::{Channel, ChannelObserver, DeleteDecision, ModeChange, ModeSpec};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const PERMANENT_MODE_LETTER: char = 'P';
pub const PERMANENT_MODE_NAME: &str = "permanent";

/// Set when a permanent channel changed since the last successful flush.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Channel mode `+P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermanentMode {
    letter: char,
    oper_only: bool,
}

impl PermanentMode {
    pub fn new(oper_only: bool) -> Self {
        Self {
            letter: PERMANENT_MODE_LETTER,
            oper_only,
        }
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn oper_only(&self) -> bool {
        self.oper_only
    }

    pub fn set_oper_only(&mut self, oper_only: bool) {
        self.oper_only = oper_only;
    }

    /// Registry entry for this mode.
    pub fn spec(&self) -> ModeSpec {
        ModeSpec {
            oper_only: self.oper_only,
            ..ModeSpec::flag(self.letter, PERMANENT_MODE_NAME)
        }
    }

    pub fn is_set(&self, channel: &Channel) -> bool {
        channel.is_mode_set(self.letter)
    }
}

/// Registry observer: keeps `+P` channels alive and marks them dirty.
#[derive(Debug, Clone)]
pub struct PermanenceHooks {
    mode: PermanentMode,
    dirty: DirtyFlag,
}

impl PermanenceHooks {
    pub fn new(mode: PermanentMode, dirty: DirtyFlag) -> Self {
        Self { mode, dirty }
    }
}

impl ChannelObserver for PermanenceHooks {
    fn on_raw_mode(&self, channel: &Channel, change: &ModeChange) {
        if self.mode.is_set(channel) || change.letter == self.mode.letter() {
            self.dirty.mark();
        }
    }

    fn on_post_topic_change(&self, channel: &Channel) {
        if self.mode.is_set(channel) {
            self.dirty.mark();
        }
    }

    fn on_pre_delete(&self, channel: &Channel) -> DeleteDecision {
        if self.mode.is_set(channel) {
            DeleteDecision::Deny
        } else {
            DeleteDecision::Allow
        }
    }
}
