//! String literal and attribute codecs shared by the scanners.

use std::borrow::Cow;

/// Strip the surrounding quotes (double, single, or parens) or a leading `=`
/// from a directive argument.
pub fn trim_quotes(value: &str) -> &str {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        match (bytes[0], bytes[bytes.len() - 1]) {
            (b'"', b'"') | (b'\'', b'\'') | (b'(', b')') => {
                return value[1..value.len() - 1].trim();
            }
            _ => {}
        }
    }
    value.strip_prefix('=').map_or(value, str::trim)
}

/// Decode a JS-style string literal.
///
/// Surrounding quotes, when present, are removed before the backslash escapes
/// are expanded. Unrecognised escapes keep the escaped character.
pub fn decode_string(value: &str) -> String {
    let bytes = value.as_bytes();
    let inner = if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&code);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Encode `value` as a quoted JS string literal using `quote` (`"` or `'`).
pub fn encode_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Decode HTML character references in an attribute value.
pub fn decode_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            out.push_str(rest);
            return out;
        };
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let decoded = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str(&rest[..=end]);
                    }
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Encode the characters that are unsafe inside a `quote`-delimited HTML
/// attribute value. The quotes themselves are not added.
pub fn encode_attr(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quote == '"' => out.push_str("&quot;"),
            '\'' if quote == '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Split a raw URL into `(path, query, hash)`.
///
/// The query keeps its leading `?` and the hash its leading `#`.
pub fn split_url(url: &str) -> (&str, &str, &str) {
    let (before_hash, hash) = match url.find('#') {
        Some(pos) => url.split_at(pos),
        None => (url, ""),
    };
    let (path, query) = match before_hash.find('?') {
        Some(pos) => before_hash.split_at(pos),
        None => (before_hash, ""),
    };
    (path, query, hash)
}

/// A consumed `?name[=value]` query marker. See
/// [crate::resolver::ResolveResult::resolve_query].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryValue {
    /// The marker is absent.
    None,
    /// The marker is present without a numeric value (`?name`, `?name=true`,
    /// `?name=yes`, `?name=on`).
    Flag,
    /// The marker carries a numeric value (`?name=20`).
    Bytes(u64),
}

impl QueryValue {
    pub const fn is_present(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Remove `name` from `query` (a `?a=1&b` string) and report what it held.
pub fn take_query(query: &mut String, name: &str) -> QueryValue {
    if query.is_empty() {
        return QueryValue::None;
    }
    let mut found = QueryValue::None;
    let mut kept: Vec<&str> = Vec::new();
    for pair in query[1..].split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (pair, None),
        };
        if key != name || found.is_present() {
            kept.push(pair);
            continue;
        }
        found = match value {
            None | Some("true" | "yes" | "on") => QueryValue::Flag,
            Some(num) => match num.parse::<u64>() {
                Ok(bytes) => QueryValue::Bytes(bytes),
                Err(_) => QueryValue::Flag,
            },
        };
    }
    if found.is_present() {
        *query = if kept.is_empty() {
            String::new()
        } else {
            let mut rebuilt = String::with_capacity(query.len());
            rebuilt.push('?');
            rebuilt.push_str(&kept.join("&"));
            rebuilt
        };
    }
    found
}

/// Percent-encode `text` for the payload of a `data:` URI.
pub fn encode_data_text(text: &str) -> Cow<'_, str> {
    use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
    // Keep the common URL-safe characters readable; everything else escapes.
    const DATA: &AsciiSet = &CONTROLS
        .add(b' ')
        .add(b'"')
        .add(b'#')
        .add(b'%')
        .add(b'<')
        .add(b'>')
        .add(b'?')
        .add(b'\'')
        .add(b'\\')
        .add(b'`')
        .add(b'{')
        .add(b'}');
    utf8_percent_encode(text, DATA).into()
}
