//! Snapshot file format.
//!
//! A snapshot is a short comment header followed by one line per channel:
//!
//! ```text
//! <permchannels channel="#chan" ts="1700000000" topic="hi" topicts="1700000001" topicsetby="alice" banlist="*!*@x op 1700000002" modes="+nt">
//! ```
//!
//! Version 2 writes each list mode as its own `<name>list` attribute of
//! `mask setter time` triples. Version 1 has no such attributes: list masks
//! are folded into `modes` and their setter and time are lost. Readers tell
//! the two apart by attribute presence alone.

use super::escape::{escape, unescape};
use crate::error::LoadError;
use crate::state::{ListEntry, irc_to_lower};
use chrono::DateTime;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::warn;

/// Tag name opening every record line.
pub const RECORD_TAG: &str = "permchannels";

/// Snapshot format written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// List masks inline in `modes`.
    V1,
    /// List modes as `<name>list` attributes with setter and time.
    V2,
}

impl FormatVersion {
    pub fn from_number(version: u8) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

/// Entries of one list mode on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListModeEntries {
    /// Mode name, as in the `<name>list` attribute.
    pub name: String,
    /// Mode letter. Known when gathered from a live channel; snapshot files
    /// only record the name.
    pub letter: Option<char>,
    pub entries: Vec<ListEntry>,
}

/// One persisted channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: String,
    pub created_at: Option<i64>,
    pub topic: Option<String>,
    pub topic_set_at: Option<i64>,
    pub topic_set_by: Option<String>,
    /// Flag and parameter modes in canonical text form ("+ntk key").
    pub modes: String,
    pub lists: Vec<ListModeEntries>,
    /// List entries that could not be parsed and were left out of `lists`.
    pub dropped_list_entries: usize,
}

impl ChannelRecord {
    /// Entries recorded for the named list mode, if any.
    pub fn list(&self, name: &str) -> Option<&[ListEntry]> {
        self.lists
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.entries.as_slice())
    }
}

/// Encoder settings.
#[derive(Debug, Clone)]
pub struct EncodeOptions<'a> {
    pub version: FormatVersion,
    /// Persist list modes at all.
    pub list_modes: bool,
    /// Unix time stamped into the header comment.
    pub generated_at: i64,
    /// Program name and version for the header comment.
    pub generator: &'a str,
}

/// Serialize records into snapshot text.
pub fn encode(records: &[ChannelRecord], opts: &EncodeOptions<'_>) -> String {
    let generated = DateTime::from_timestamp(opts.generated_at, 0)
        .map(|t| t.to_rfc2822())
        .unwrap_or_else(|| opts.generated_at.to_string());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "# This file was automatically generated by {} on {generated}.",
        opts.generator
    );
    out.push_str("# Any changes to this file will be automatically overwritten.\n\n");

    for record in records {
        out.push_str(&encode_record(record, opts.version, opts.list_modes));
        out.push('\n');
    }
    out
}

/// Serialize a single record line (no trailing newline).
pub fn encode_record(record: &ChannelRecord, version: FormatVersion, list_modes: bool) -> String {
    let mut line = format!(
        "<{RECORD_TAG} channel=\"{}\" ts=\"{}\"",
        escape(&record.name),
        record.created_at.unwrap_or_default()
    );

    if let Some(topic) = record.topic.as_deref().filter(|t| !t.is_empty()) {
        let _ = write!(
            line,
            " topic=\"{}\" topicts=\"{}\" topicsetby=\"{}\"",
            escape(topic),
            record.topic_set_at.unwrap_or_default(),
            escape(record.topic_set_by.as_deref().unwrap_or_default())
        );
    }

    let modes = match version {
        FormatVersion::V2 => {
            if list_modes {
                for list in record.lists.iter().filter(|l| !l.entries.is_empty()) {
                    let value = list
                        .entries
                        .iter()
                        .map(|e| format!("{} {} {}", e.mask, e.set_by, e.set_at))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let _ = write!(line, " {}list=\"{}\"", list.name, escape(&value));
                }
            }
            record.modes.clone()
        }
        FormatVersion::V1 if list_modes => inline_list_modes(&record.modes, &record.lists),
        FormatVersion::V1 => record.modes.clone(),
    };

    let _ = write!(line, " modes=\"{}\">", escape(&modes));
    line
}

/// Fold list masks into a mode string the version 1 way: letters join the
/// leading letter run, masks go after every other parameter.
fn inline_list_modes(modes: &str, lists: &[ListModeEntries]) -> String {
    let mut letters = String::new();
    let mut masks = Vec::new();
    for list in lists {
        let Some(letter) = list.letter else {
            continue;
        };
        for entry in &list.entries {
            letters.push(letter);
            masks.push(entry.mask.as_str());
        }
    }
    if masks.is_empty() {
        return modes.to_string();
    }

    let mut out = modes.to_string();
    match out.find(' ') {
        Some(space) => out.insert_str(space, &letters),
        None => out.push_str(&letters),
    }
    out.push(' ');
    out.push_str(&masks.join(" "));
    out
}

/// Parse snapshot text. Bad lines are logged and skipped; a later record
/// for the same channel replaces an earlier one.
pub fn decode(input: &str) -> Vec<ChannelRecord> {
    decode_bytes(input.as_bytes())
}

/// Parse raw snapshot bytes. Invalid UTF-8 is replaced line by line, so one
/// bad byte costs at most the text it sits in.
pub fn decode_bytes(input: &[u8]) -> Vec<ChannelRecord> {
    let mut records: Vec<ChannelRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (idx, raw) in input.split(|b| *b == b'\n').enumerate() {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Cow::Owned(_) = text {
            warn!(line = idx + 1, "Snapshot line is not valid UTF-8, replacing bad bytes");
        }
        match parse_line(line, idx + 1) {
            Ok(record) => match index.get(&irc_to_lower(&record.name)) {
                Some(&slot) => records[slot] = record,
                None => {
                    index.insert(irc_to_lower(&record.name), records.len());
                    records.push(record);
                }
            },
            Err(e) => warn!(error = %e, "Skipping snapshot line"),
        }
    }
    records
}

/// Parse one `<permchannels ...>` line.
pub fn parse_line(line: &str, line_no: usize) -> Result<ChannelRecord, LoadError> {
    let malformed = |reason: String| LoadError::MalformedRecord {
        line: line_no,
        reason,
    };

    let body = line
        .trim()
        .strip_prefix('<')
        .and_then(|l| l.strip_suffix('>'))
        .ok_or_else(|| malformed("not a <...> tag".into()))?;
    let (tag, attrs) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    if tag != RECORD_TAG {
        return Err(malformed(format!("unexpected tag {tag:?}")));
    }

    let mut record = ChannelRecord::default();
    let mut has_name = false;
    for (key, value) in parse_attributes(attrs).map_err(malformed)? {
        match key {
            "channel" => {
                record.name = value;
                has_name = true;
            }
            "ts" => record.created_at = Some(parse_number(key, &value).map_err(malformed)?),
            "topic" => record.topic = Some(value),
            "topicts" => record.topic_set_at = Some(parse_number(key, &value).map_err(malformed)?),
            "topicsetby" => record.topic_set_by = Some(value),
            "modes" => record.modes = value,
            _ => {
                if let Some(name) = key.strip_suffix("list").filter(|n| !n.is_empty()) {
                    let (entries, dropped) = parse_list_entries(&record.name, name, &value);
                    record.dropped_list_entries += dropped;
                    record.lists.push(ListModeEntries {
                        name: name.to_string(),
                        letter: None,
                        entries,
                    });
                }
            }
        }
    }

    if !has_name {
        return Err(malformed("missing channel attribute".into()));
    }
    Ok(record)
}

fn parse_number(key: &str, value: &str) -> Result<i64, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{key} is not a number: {value:?}"))
}

/// Split `key="value"` pairs. Values are unescaped.
fn parse_attributes(mut rest: &str) -> Result<Vec<(&str, String)>, String> {
    let mut attrs = Vec::new();
    rest = rest.trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| format!("dangling text {rest:?}"))?;
        let key = rest[..eq].trim_end();
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("bad attribute name {key:?}"));
        }
        let quoted = rest[eq + 1..]
            .trim_start()
            .strip_prefix('"')
            .ok_or_else(|| format!("value of {key} is not quoted"))?;
        let close = quoted
            .find('"')
            .ok_or_else(|| format!("unterminated value for {key}"))?;
        attrs.push((key, unescape(&quoted[..close])));
        rest = quoted[close + 1..].trim_start();
    }
    Ok(attrs)
}

/// Parse `mask setter time` triples. Triples may be separated by plain
/// whitespace or by `"; "`. Parsing stops at the first malformed triple;
/// the second value counts the triples left unparsed.
pub fn parse_list_entries(channel: &str, mode: &str, value: &str) -> (Vec<ListEntry>, usize) {
    let mut entries = Vec::new();
    let tokens: Vec<&str> = value.split_whitespace().collect();
    for (pos, triple) in tokens.chunks(3).enumerate() {
        let dropped = (tokens.len() - pos * 3).div_ceil(3);
        let &[mask, set_by, time] = triple else {
            warn!(channel = %channel, mode = %mode, mask = %triple[0], "Incomplete list entry");
            return (entries, dropped);
        };
        let Ok(set_at) = time.trim_end_matches(';').parse::<i64>() else {
            warn!(channel = %channel, mode = %mode, mask = %mask, time = %time, dropped, "Bad list entry time");
            return (entries, dropped);
        };
        entries.push(ListEntry {
            mask: mask.to_string(),
            set_by: set_by.to_string(),
            set_at,
        });
    }
    (entries, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(mask: &str, set_by: &str, set_at: i64) -> ListEntry {
        ListEntry {
            mask: mask.into(),
            set_by: set_by.into(),
            set_at,
        }
    }

    fn sample() -> ChannelRecord {
        ChannelRecord {
            name: "#rust".into(),
            created_at: Some(1_700_000_000),
            topic: Some(r#"Say "hi" & behave"#.into()),
            topic_set_at: Some(1_700_000_100),
            topic_set_by: Some("alice!a@host".into()),
            modes: "+knt hunter2".into(),
            lists: vec![
                ListModeEntries {
                    name: "ban".into(),
                    letter: Some('b'),
                    entries: vec![
                        entry("*!*@spam.example", "alice", 1_700_000_200),
                        entry("troll!*@*", "bob", 1_700_000_300),
                    ],
                },
                ListModeEntries {
                    name: "invex".into(),
                    letter: Some('I'),
                    entries: vec![entry("*!*@friend", "carol", 1_700_000_400)],
                },
            ],
            dropped_list_entries: 0,
        }
    }

    fn opts(version: FormatVersion) -> EncodeOptions<'static> {
        EncodeOptions {
            version,
            list_modes: true,
            generated_at: 1_700_000_500,
            generator: "slircd-permchan test",
        }
    }

    #[test]
    fn v2_line_field_order() {
        let line = encode_record(&sample(), FormatVersion::V2, true);
        assert_eq!(
            line,
            "<permchannels channel=\"#rust\" ts=\"1700000000\" \
             topic=\"Say &quot;hi&quot; &amp; behave\" topicts=\"1700000100\" topicsetby=\"alice!a@host\" \
             banlist=\"*!*@spam.example alice 1700000200 troll!*@* bob 1700000300\" \
             invexlist=\"*!*@friend carol 1700000400\" \
             modes=\"+knt hunter2\">"
        );
    }

    #[test]
    fn v2_round_trip() {
        let text = encode(&[sample()], &opts(FormatVersion::V2));
        assert!(text.starts_with("# This file was automatically generated by slircd-permchan test on "));

        let mut expected = sample();
        for list in &mut expected.lists {
            list.letter = None;
        }
        assert_eq!(decode(&text), vec![expected]);
    }

    #[test]
    fn v1_inlines_masks_after_params() {
        let line = encode_record(&sample(), FormatVersion::V1, true);
        assert!(line.ends_with(
            "modes=\"+kntbbI hunter2 *!*@spam.example troll!*@* *!*@friend\">"
        ));
        assert!(!line.contains("banlist"));

        let mut no_params = sample();
        no_params.modes = "+nt".into();
        let line = encode_record(&no_params, FormatVersion::V1, true);
        assert!(line.ends_with("modes=\"+ntbbI *!*@spam.example troll!*@* *!*@friend\">"));
    }

    #[test]
    fn list_modes_disabled_writes_plain_modes() {
        for version in [FormatVersion::V1, FormatVersion::V2] {
            let line = encode_record(&sample(), version, false);
            assert!(!line.contains("list="));
            assert!(line.ends_with("modes=\"+knt hunter2\">"));
        }
    }

    #[test]
    fn no_topic_omits_topic_group() {
        let mut record = sample();
        record.topic = Some(String::new());
        let line = encode_record(&record, FormatVersion::V2, false);
        assert!(!line.contains("topic"));
        let decoded = parse_line(&line, 1).unwrap();
        assert_eq!(decoded.topic, None);
        assert_eq!(decoded.topic_set_at, None);
    }

    #[test]
    fn decode_skips_bad_lines_and_keeps_last_duplicate() {
        let text = "\
# header
<permchannels channel=\"#a\" ts=\"1\" modes=\"+n\">
<permchannels channel=\"#b\" ts=\"nope\" modes=\"+n\">
<permchannels ts=\"3\" modes=\"+n\">
garbage
<permchannels channel=\"#c\" ts=\"4\" modes=\"+t\"
<permchannels channel=\"#A\" ts=\"5\" modes=\"+s\" futureattr=\"x\">
";
        let records = decode(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "#A");
        assert_eq!(records[0].created_at, Some(5));
        assert_eq!(records[0].modes, "+s");
    }

    #[test]
    fn duplicates_replace_earlier_record_in_place() {
        let text = "\
<permchannels channel=\"#a\" ts=\"1\" modes=\"+n\">
<permchannels channel=\"#b\" ts=\"2\" modes=\"+n\">
<permchannels channel=\"#A\" ts=\"3\" modes=\"+t\">
<permchannels channel=\"#c\" ts=\"4\" modes=\"+n\">
<permchannels channel=\"#B\" ts=\"5\" modes=\"+t\">
";
        let names: Vec<_> = decode(text)
            .into_iter()
            .map(|r| (r.name, r.created_at))
            .collect();
        assert_eq!(
            names,
            [
                ("#A".to_string(), Some(3)),
                ("#B".to_string(), Some(5)),
                ("#c".to_string(), Some(4)),
            ]
        );
    }

    #[test]
    fn list_triples_accept_semicolons_and_stop_at_garbage() {
        let (entries, dropped) =
            parse_list_entries("#x", "ban", "a!*@* op 10; b!*@* op 11; c!*@* op");
        assert_eq!(entries, vec![entry("a!*@*", "op", 10), entry("b!*@*", "op", 11)]);
        assert_eq!(dropped, 1);

        let (entries, dropped) = parse_list_entries("#x", "ban", "a!*@* op soon b!*@* op 11");
        assert!(entries.is_empty());
        assert_eq!(dropped, 2);

        assert_eq!(parse_list_entries("#x", "ban", "").1, 0);
    }

    #[test]
    fn missing_ts_decodes_as_absent() {
        let record = parse_line("<permchannels channel=\"#x\" modes=\"+\">", 1).unwrap();
        assert_eq!(record.created_at, None);
        assert_eq!(record.modes, "+");
    }

    #[test]
    fn version_numbers() {
        assert_eq!(FormatVersion::from_number(1), Some(FormatVersion::V1));
        assert_eq!(FormatVersion::from_number(2), Some(FormatVersion::V2));
        assert_eq!(FormatVersion::from_number(3), None);
    }

    fn channel_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[#&][a-zA-Z0-9_\\-\\[\\]]{1,49}").expect("valid regex")
    }

    fn setter_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,8}(![a-z]{1,9}@[a-z0-9.]{1,20})?")
            .expect("valid regex")
    }

    fn mask_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z*?]{1,9}![a-z*?]{1,9}@[a-z0-9*?.]{1,20}").expect("valid regex")
    }

    fn modes_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("\\+[imnpst]{0,5}( [a-zA-Z0-9]{1,10}){0,2}").expect("valid regex")
    }

    prop_compose! {
        fn list_strategy(name: &'static str)(
            entries in prop::collection::vec(
                (mask_strategy(), setter_strategy(), any::<i64>())
                    .prop_map(|(mask, set_by, set_at)| ListEntry { mask, set_by, set_at }),
                1..5,
            )
        ) -> ListModeEntries {
            ListModeEntries { name: name.to_string(), letter: None, entries }
        }
    }

    prop_compose! {
        fn record_strategy()(
            name in channel_strategy(),
            ts in any::<i64>(),
            topic in prop::option::of((".{1,80}", any::<i64>(), setter_strategy())),
            modes in modes_strategy(),
            bans in prop::option::of(list_strategy("ban")),
            invex in prop::option::of(list_strategy("invex")),
        ) -> ChannelRecord {
            let (topic, topic_set_at, topic_set_by) = match topic {
                Some((text, at, by)) => (Some(text), Some(at), Some(by)),
                None => (None, None, None),
            };
            ChannelRecord {
                name,
                created_at: Some(ts),
                topic,
                topic_set_at,
                topic_set_by,
                modes,
                lists: bans.into_iter().chain(invex).collect(),
                dropped_list_entries: 0,
            }
        }
    }

    proptest! {
        #[test]
        fn v2_records_survive_round_trip(record in record_strategy()) {
            let text = encode(std::slice::from_ref(&record), &opts(FormatVersion::V2));
            prop_assert_eq!(decode(&text), vec![record]);
        }

        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode_bytes(&bytes);
        }
    }
}
