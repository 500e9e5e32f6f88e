//! Channel mode registry.
//!
//! Modes are looked up by letter when parsing mode strings and by name when
//! reading snapshot list attributes (`banlist`, `invexlist`, ...).

use crate::error::ChannelError;

/// How a mode stores its value on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// On/off, no parameter (+n, +t).
    Flag,
    /// Single value, parameter needed only when setting (+k, +l).
    Param,
    /// Set of (mask, setter, time) entries, parameter needed both ways (+b).
    List,
}

/// A registered channel mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSpec {
    pub letter: char,
    pub name: String,
    pub kind: ModeKind,
    /// Only IRC operators may change this mode.
    pub oper_only: bool,
}

impl ModeSpec {
    pub fn flag(letter: char, name: &str) -> Self {
        Self::new(letter, name, ModeKind::Flag)
    }

    pub fn param(letter: char, name: &str) -> Self {
        Self::new(letter, name, ModeKind::Param)
    }

    pub fn list(letter: char, name: &str) -> Self {
        Self::new(letter, name, ModeKind::List)
    }

    fn new(letter: char, name: &str, kind: ModeKind) -> Self {
        Self {
            letter,
            name: name.to_string(),
            kind,
            oper_only: false,
        }
    }

    /// Whether a change in the given direction consumes a parameter.
    pub fn needs_param(&self, adding: bool) -> bool {
        match self.kind {
            ModeKind::Flag => false,
            ModeKind::Param => adding,
            ModeKind::List => true,
        }
    }

    pub fn is_list(&self) -> bool {
        self.kind == ModeKind::List
    }
}

/// Ordered set of channel modes. Iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct ModeRegistry {
    modes: Vec<ModeSpec>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual channel modes: ban/exception/invex lists, key and limit,
    /// and the common flags.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for spec in [
            ModeSpec::list('b', "ban"),
            ModeSpec::list('e', "banexception"),
            ModeSpec::list('I', "invex"),
            ModeSpec::param('k', "key"),
            ModeSpec::param('l', "limit"),
            ModeSpec::flag('i', "inviteonly"),
            ModeSpec::flag('m', "moderated"),
            ModeSpec::flag('n', "noextmsg"),
            ModeSpec::flag('p', "private"),
            ModeSpec::flag('s', "secret"),
            ModeSpec::flag('t', "topiclock"),
        ] {
            registry.modes.push(spec);
        }
        registry
    }

    /// Register a mode. Letters must be unique.
    pub fn register(&mut self, spec: ModeSpec) -> Result<(), ChannelError> {
        if self.find(spec.letter).is_some() {
            return Err(ChannelError::DuplicateMode(spec.letter));
        }
        self.modes.push(spec);
        Ok(())
    }

    pub fn find(&self, letter: char) -> Option<&ModeSpec> {
        self.modes.iter().find(|m| m.letter == letter)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ModeSpec> {
        self.modes.iter().find(|m| m.name == name)
    }

    /// List modes in registration order.
    pub fn list_modes(&self) -> impl Iterator<Item = &ModeSpec> {
        self.modes.iter().filter(|m| m.is_list())
    }

    /// Toggle the oper-only restriction of a registered mode.
    pub fn set_oper_only(&mut self, letter: char, oper_only: bool) -> bool {
        match self.modes.iter_mut().find(|m| m.letter == letter) {
            Some(spec) => {
                spec.oper_only = oper_only;
                true
            }
            None => false,
        }
    }
}

/// Who is changing a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSource {
    /// The server itself (startup replay, services).
    Server,
    /// A local user.
    User { nick: String, oper: bool },
}

impl ModeSource {
    pub fn is_privileged(&self) -> bool {
        match self {
            Self::Server => true,
            Self::User { oper, .. } => *oper,
        }
    }

    /// Name recorded as the setter of list entries and topics.
    pub fn display_name<'a>(&'a self, server_name: &'a str) -> &'a str {
        match self {
            Self::Server => server_name,
            Self::User { nick, .. } => nick,
        }
    }
}

/// A single mode change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub letter: char,
    pub adding: bool,
    pub param: Option<String>,
    /// Setter recorded on list entries; defaults to the source.
    pub set_by: Option<String>,
    /// Time recorded on list entries; defaults to now.
    pub set_at: Option<i64>,
}

impl ModeChange {
    pub fn add(letter: char) -> Self {
        Self {
            letter,
            adding: true,
            param: None,
            set_by: None,
            set_at: None,
        }
    }

    pub fn remove(letter: char) -> Self {
        Self {
            adding: false,
            ..Self::add(letter)
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_origin(mut self, set_by: impl Into<String>, set_at: i64) -> Self {
        self.set_by = Some(set_by.into());
        self.set_at = Some(set_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_rules_follow_kind() {
        let registry = ModeRegistry::with_defaults();
        let ban = registry.find('b').unwrap();
        assert!(ban.needs_param(true) && ban.needs_param(false));
        let key = registry.find('k').unwrap();
        assert!(key.needs_param(true) && !key.needs_param(false));
        let moderated = registry.find('m').unwrap();
        assert!(!moderated.needs_param(true));
    }

    #[test]
    fn list_modes_keep_registration_order() {
        let registry = ModeRegistry::with_defaults();
        let names: Vec<_> = registry.list_modes().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["ban", "banexception", "invex"]);
        assert_eq!(registry.find_by_name("invex").map(|m| m.letter), Some('I'));
    }

    #[test]
    fn duplicate_letter_rejected() {
        let mut registry = ModeRegistry::with_defaults();
        assert_eq!(
            registry.register(ModeSpec::flag('n', "other")),
            Err(ChannelError::DuplicateMode('n'))
        );
        assert!(registry.register(ModeSpec::flag('c', "nocolor")).is_ok());
    }

    #[test]
    fn set_oper_only_on_known_mode() {
        let mut registry = ModeRegistry::with_defaults();
        assert!(registry.set_oper_only('s', true));
        assert!(registry.find('s').unwrap().oper_only);
        assert!(!registry.set_oper_only('Z', true));
    }
}
