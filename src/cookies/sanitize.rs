//! Input sanitation for cookie fields that end up in storage or the UI.

/// Default maximum length, in characters, kept by [`sanitize_input`].
pub const MAX_FIELD_LEN: usize = 256;

/// Strip control characters, truncate to `max_len` characters and
/// HTML-escape the result.
///
/// Tab, newline and carriage return are kept.
pub fn sanitize_with_limit(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_len));

    let kept = input
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .take(max_len);

    for c in kept {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }

    out
}

/// [`sanitize_with_limit`] with [`MAX_FIELD_LEN`].
pub fn sanitize_input(input: &str) -> String {
    sanitize_with_limit(input, MAX_FIELD_LEN)
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}
