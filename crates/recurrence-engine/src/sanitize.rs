//! Markup stripping for values copied onto generated occurrences.
//!
//! Titles and string attributes are user-authored and end up rendered
//! elsewhere, so executable markup is removed before anything is written.
//! This is a conservative plain-text filter, not an HTML parser: every tag is
//! dropped, and the bodies of raw-text elements (`<script>`, `<style>`, ...)
//! are dropped together with their tags.

/// Elements whose content is removed along with the tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "noscript"];

/// URL schemes that execute code when rendered as a link.
const EXECUTABLE_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

/// Strip tags, raw-text element bodies and executable URL schemes; trim the result.
pub fn strip_markup(input: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `input`.
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(open) = rest.find('<') else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..open]);

        let tag_start = pos + open;
        let lower_rest = &lower[tag_start..];

        if let Some(element) = RAW_TEXT_ELEMENTS
            .iter()
            .find(|name| opens_element(lower_rest, name))
        {
            let closing = format!("</{element}");
            pos = match lower_rest.find(&closing) {
                Some(close) => {
                    let after = tag_start + close;
                    lower[after..]
                        .find('>')
                        .map_or(input.len(), |gt| after + gt + 1)
                }
                None => input.len(),
            };
            continue;
        }

        match lower_rest.find('>') {
            Some(gt) if looks_like_tag(lower_rest) => pos = tag_start + gt + 1,
            // A bare '<' in prose ("a < b") is kept.
            _ => {
                out.push('<');
                pos = tag_start + 1;
            }
        }
    }

    let mut cleaned = out;
    for scheme in EXECUTABLE_SCHEMES {
        cleaned = remove_ignore_ascii_case(&cleaned, scheme);
    }
    cleaned.trim().to_string()
}

/// Truncate to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

/// `s` starts with `<name` followed by a tag delimiter.
fn opens_element(s: &str, name: &str) -> bool {
    let Some(after) = s.strip_prefix('<').and_then(|r| r.strip_prefix(name)) else {
        return false;
    };
    matches!(
        after.as_bytes().first(),
        None | Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
    )
}

fn looks_like_tag(s: &str) -> bool {
    matches!(
        s.as_bytes().get(1),
        Some(c) if c.is_ascii_alphabetic() || matches!(c, b'/' | b'!' | b'?')
    )
}

fn remove_ignore_ascii_case(s: &str, needle: &str) -> String {
    let mut result = s.to_string();
    loop {
        let lower = result.to_ascii_lowercase();
        match lower.find(needle) {
            Some(idx) => result.replace_range(idx..idx + needle.len(), ""),
            None => return result,
        }
    }
}
