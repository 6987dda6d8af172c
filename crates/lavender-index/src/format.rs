//! Line format of index files.
//!
//! Each label is one line:
//!
//! ```text
//! <lavendelized path>=<original path>:<hex hash>
//! ```
//!
//! The key escapes the separators (`=`, `:`), comment markers, whitespace and `\` with a
//! backslash; the value only escapes `\` and control characters because the hash is always the
//! text after the last `:`. Blank lines and lines starting with `#` or `!` are comments.

use crate::error::{IndexError, Result};
use crate::hash::ContentHash;
use crate::label::Label;

pub(crate) fn write_line(out: &mut String, label: &Label) {
    escape_into(out, label.lavendelized_path(), true);
    out.push('=');
    escape_into(out, label.original_path(), false);
    out.push(':');
    out.push_str(&label.hash().to_hex());
    out.push('\n');
}

/// Parses every label line of `text`, in order.
pub(crate) fn parse_lines(text: &str) -> Result<Vec<Label>> {
    let mut labels = Vec::new();
    for (idx, raw) in text.split('\n').enumerate() {
        let line_no = idx + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        labels.push(parse_line(line, line_no)?);
    }
    Ok(labels)
}

fn parse_line(line: &str, line_no: usize) -> Result<Label> {
    let Some(sep) = find_unescaped(line, '=') else {
        return Err(IndexError::parse(line_no, "missing `=` between key and value"));
    };
    let (key, value) = (&line[..sep], &line[sep + 1..]);

    let Some(colon) = value.rfind(':') else {
        return Err(IndexError::parse(line_no, "missing `:` before content hash"));
    };
    let (original, hash) = (&value[..colon], &value[colon + 1..]);

    let lavendelized = unescape(key, line_no)?;
    if lavendelized.is_empty() {
        return Err(IndexError::parse(line_no, "empty lavendelized path"));
    }
    let original = unescape(original, line_no)?;
    let hash = ContentHash::from_hex(hash)
        .map_err(|err| IndexError::parse(line_no, err.to_string()))?;

    Ok(Label::new(original, lavendelized, hash))
}

fn find_unescaped(line: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(idx);
        }
    }
    None
}

fn escape_into(out: &mut String, text: &str, key: bool) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' | ' ' if key => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

fn unescape(text: &str, line_no: usize) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0C'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let decoded = (digits.len() == 4)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        return Err(IndexError::parse(
                            line_no,
                            format!("invalid unicode escape `\\u{digits}`"),
                        ))
                    }
                }
            }
            Some(other) => out.push(other),
            None => return Err(IndexError::parse(line_no, "dangling `\\` at end of field")),
        }
    }
    Ok(out)
}
