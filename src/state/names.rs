//! Channel name validation and RFC 1459 case mapping.

/// Longest channel name accepted, prefix included.
const MAX_CHANNEL_LEN: usize = 50;

/// Check if a string is a valid IRC channel name.
///
/// Valid channel names start with '#', '&', '+' or '!', are at most 50
/// characters long and contain no space, comma, BEL, NUL or other control
/// characters.
pub fn is_channel_name(name: &str) -> bool {
    let mut chars = name.chars();
    if !matches!(chars.next(), Some('#' | '&' | '+' | '!')) {
        return false;
    }
    if name.chars().count() > MAX_CHANNEL_LEN {
        return false;
    }
    chars.all(|c| c != ' ' && c != ',' && !c.is_control())
}

#[inline]
const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => c.to_ascii_lowercase(),
        _ => c,
    }
}

/// Fold a name to its registry key using the `rfc1459` case mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}
