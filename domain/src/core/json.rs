//! Lenient JSON extraction from free-form model output.
//!
//! Models frequently wrap structured output in prose or Markdown fences.
//! [`extract_first_json_object`] finds the first balanced `{ ... }` object,
//! honouring string literals and escapes so braces inside strings do not
//! confuse the scan.

/// Return the first balanced JSON object embedded in `text`.
///
/// Scanning restarts after every candidate that fails to parse, so a stray
/// `{` in leading prose does not hide a valid object later on.
pub fn extract_first_json_object(text: &str) -> Option<serde_json::Value> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(&text[start..]) {
            let candidate = &text[start..start + end];
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate)
                && value.is_object()
            {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Byte length of the balanced object starting at `text[0] == '{'`.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
