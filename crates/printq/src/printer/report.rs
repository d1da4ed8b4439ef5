//! Telemetry report field extraction.
//!
//! Printers drift on report schema between firmware versions, so fields are
//! pulled out by key search rather than a full parse: the extractor must
//! succeed on payloads carrying unknown adjacent fields. String values may
//! contain escaped quotes and backslashes.

/// Extracts the string value of `key` from a JSON payload.
pub fn extract_string(payload: &str, key: &str) -> Option<String> {
    let bytes = payload.as_bytes();
    let mut pos = seek_value(payload, key)?;

    if bytes.get(pos) != Some(&b'"') {
        return None;
    }
    pos += 1;

    let mut value = Vec::new();
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => return Some(String::from_utf8_lossy(&value).into_owned()),
            b'\\' if pos + 1 < bytes.len() => {
                let next = bytes[pos + 1];
                if next == b'"' || next == b'\\' {
                    value.push(next);
                    pos += 2;
                    continue;
                }
                value.push(b'\\');
                pos += 1;
            }
            b => {
                value.push(b);
                pos += 1;
            }
        }
    }
    None
}

/// Extracts the integer value of `key` from a JSON payload. Decimal values
/// are truncated toward zero.
pub fn extract_int(payload: &str, key: &str) -> Option<i64> {
    let bytes = payload.as_bytes();
    let mut pos = seek_value(payload, key)?;

    let start = pos;
    while pos < bytes.len()
        && (bytes[pos].is_ascii_digit() || bytes[pos] == b'-' || bytes[pos] == b'.')
    {
        pos += 1;
    }
    if pos == start {
        return None;
    }

    payload[start..pos].parse::<f64>().ok().map(|n| n as i64)
}

/// Position of the first value byte after `"key":`, skipping whitespace.
fn seek_value(payload: &str, key: &str) -> Option<usize> {
    let needle = format!("\"{}\"", key);
    let bytes = payload.as_bytes();

    let mut pos = payload.find(&needle)? + needle.len();
    pos = payload[pos..].find(':').map(|i| pos + i + 1)?;
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    Some(pos)
}

/// Whether a `gcode_state` value describes an active print.
pub fn is_printing_state(state: &str) -> bool {
    let lowered = state.to_lowercase();
    ["print", "run", "busy"].iter().any(|s| lowered.contains(s))
}

/// Whether a `gcode_state` value describes a finished print.
pub fn is_completed_state(state: &str) -> bool {
    let lowered = state.to_lowercase();
    ["finish", "complete", "idle"]
        .iter()
        .any(|s| lowered.contains(s))
}
