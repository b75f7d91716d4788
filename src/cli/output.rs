//! Output Formatting
//!
//! Renders replies in normal, JSON, or raw mode.

use std::io::{self, Write};

use super::executor::FormatType;
use super::reply::Reply;

/// Write `value` to `out` in the given mode
pub fn format_reply(value: Option<&Reply>, mode: FormatType, out: &mut dyn Write) -> io::Result<()> {
    match value {
        None | Some(Reply::Null) => {
            let nil = if mode == FormatType::Json { "null" } else { "(nil)" };
            writeln!(out, "{}", nil)
        }
        Some(reply) => format_value(reply, "", 0, 0, mode, out),
    }
}

/// Render to a string; used by tests and callers that buffer output
pub fn render(value: Option<&Reply>, mode: FormatType) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = format_reply(value, mode, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Index prefix `N) `, right-aligned to the widest index of the sequence.
///
/// The first element carries the parent prefix; later ones are indented by
/// its width so nested sequences line up.
fn make_prefix(prefix: &str, ix: usize, count: usize) -> String {
    if count == 0 {
        return prefix.to_string();
    }
    let width = digits(count - 1);
    let pad = width.saturating_sub(digits(ix));
    if ix == 0 {
        format!("{}{}{}) ", prefix, " ".repeat(pad), ix)
    } else {
        format!("{}{}) ", " ".repeat(pad + prefix.len()), ix)
    }
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

fn format_value(
    value: &Reply,
    prefix: &str,
    ix: usize,
    count: usize,
    mode: FormatType,
    out: &mut dyn Write,
) -> io::Result<()> {
    match value {
        Reply::Null => writeln!(out, "{}(nil)", make_prefix(prefix, ix, count)),
        Reply::Bool(b) => writeln!(out, "{}{}", make_prefix(prefix, ix, count), b),
        Reply::Int(n) => writeln!(out, "{}{}", make_prefix(prefix, ix, count), n),
        Reply::Double(d) => writeln!(out, "{}{}", make_prefix(prefix, ix, count), d),
        Reply::Text(_) => writeln!(out, "{}{}", make_prefix(prefix, ix, count), value_to_string(value, mode)),
        Reply::List(items) => {
            let px = make_prefix(prefix, ix, count);
            if items.is_empty() {
                return writeln!(out, "{}(empty)", px);
            }
            for (i, item) in items.iter().enumerate() {
                format_value(item, &px, i, items.len(), mode, out)?;
            }
            Ok(())
        }
        Reply::Map(pairs) => {
            let mut sorted: Vec<&(String, Reply)> = pairs.iter().collect();
            sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            for (key, v) in sorted {
                writeln!(out, "{}{} : {}", make_prefix(prefix, ix, count), key, value_to_string(v, mode))?;
            }
            Ok(())
        }
    }
}

/// Single-value rendering used for strings and map values
fn value_to_string(value: &Reply, mode: FormatType) -> String {
    if let Reply::Text(s) = value {
        match mode {
            FormatType::Raw => return s.clone(),
            FormatType::Json => {
                return match serde_json::from_str::<serde_json::Value>(s) {
                    Ok(parsed) => serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| s.clone()),
                    Err(_) => serde_json::to_string(s).unwrap_or_else(|_| s.clone()),
                };
            }
            FormatType::Normal => {}
        }
    }
    serde_json::to_string_pretty(value).unwrap_or_default()
}
