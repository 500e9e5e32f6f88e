//! State management module.
//!
//! The in-memory host the persistence core talks to: channels, the channel
//! mode registry, observer hooks and the linked-server view.

mod channel;
mod modes;
mod names;
mod registry;
mod servers;

pub use channel::{Channel, ListEntry, Topic};
pub use modes::{ModeChange, ModeKind, ModeRegistry, ModeSource, ModeSpec};
pub use names::{irc_to_lower, is_channel_name};
pub use registry::{ChannelObserver, ChannelRegistry, DeleteDecision};
pub use servers::{ServerList, StaticServerList};
