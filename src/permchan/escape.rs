//! Attribute value escaping.
//!
//! Snapshot values sit between double quotes on a single line, so quotes,
//! ampersands, angle brackets and control characters are written as XML-ish
//! entities: `&quot;`, `&amp;`, `&lt;`, `&gt;`, `&nl;` and `&#N;`.

/// Escape a value for use inside `key="..."`.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("&nl;"),
            c if c.is_control() => {
                out.push_str("&#");
                out.push_str(&u32::from(c).to_string());
                out.push(';');
            }
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`].
///
/// Unknown or unterminated entities are kept verbatim so hand-edited files
/// still load.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "nl" => Some('\n'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escapes_delimiters() {
        assert_eq!(escape(r#"say "hi" & <bye>"#), "say &quot;hi&quot; &amp; &lt;bye&gt;");
        assert_eq!(escape("a\nb\tc\x01"), "a&nl;b&#9;c&#1;");
        assert_eq!(escape("plain #text"), "plain #text");
    }

    #[test]
    fn round_trips_awkward_strings() {
        for s in [
            "",
            "\"",
            "&quot;",
            "&amp;&amp;",
            "trailing &",
            "&#;",
            "\"quoted\" <tag> & \r\n\x07 end",
            "unicode ☃ \u{1F600} \"",
            "&nl; literally",
        ] {
            assert_eq!(unescape(&escape(s)), s, "round trip of {s:?}");
            assert!(!escape(s).contains('"'));
        }
    }

    #[test]
    fn lenient_on_unknown_entities() {
        assert_eq!(unescape("&bogus; &amp"), "&bogus; &amp");
        assert_eq!(unescape("&#x41;&#66;"), "AB");
        assert_eq!(unescape("&#xD800;"), "&#xD800;");
    }

    proptest! {
        #[test]
        fn unescape_inverts_escape(s in any::<String>()) {
            prop_assert_eq!(unescape(&escape(&s)), s);
        }

        #[test]
        fn escaped_values_stay_on_one_quoted_line(s in any::<String>()) {
            let escaped = escape(&s);
            prop_assert!(!escaped.contains(['"', '<', '>', '\n', '\r']));
        }
    }
}
