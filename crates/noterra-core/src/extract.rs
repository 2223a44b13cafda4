//! Robust JSON extraction from model output.
//!
//! Models routinely wrap the JSON they were asked for in prose or code
//! fences. [`extract_json`] locates the first syntactically balanced `{...}`
//! span in the text — tracking nested braces and ignoring braces inside
//! string literals — and parses it, ignoring everything around it.

use serde_json::Value;

use crate::error::{Error, Result};

/// Extract the first balanced JSON object embedded anywhere in `raw`.
///
/// A balanced span that fails to parse does not abort the scan; the next
/// candidate span is tried. Returns `Error::NoJsonFound` when no span parses.
pub fn extract_json(raw: &str) -> Result<Value> {
    let mut search_from = 0;

    while let Some(offset) = raw[search_from..].find('{') {
        let start = search_from + offset;
        match balanced_end(&raw[start..]) {
            Some(len) => {
                let candidate = &raw[start..start + len];
                if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                    if value.is_object() {
                        return Ok(value);
                    }
                }
                // Unparseable span: resume after its opening brace.
                search_from = start + 1;
            }
            // No closing brace for this opening; later openings are nested
            // inside it, so nothing balanced remains.
            None => break,
        }
    }

    Err(Error::NoJsonFound)
}

/// Length of the balanced `{...}` span starting at byte 0 of `s`, or `None`
/// when the braces never balance.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
