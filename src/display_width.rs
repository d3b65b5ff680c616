use unicode_width::UnicodeWidthStr;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Rewrites inline HTML in a label: `<br>`, `<br/>` and `<br />` (any case)
/// become `\n`, every other tag is dropped while its inner text is kept.
///
/// A `<` that does not open a tag (`a < b`) is left as text.
pub fn normalize_html(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let lower_bytes = lower.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut start = 0;
    let mut i = 0;

    while i < lower_bytes.len() {
        if lower_bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let br_len = if lower[i..].starts_with("<br/>") {
            5
        } else if lower[i..].starts_with("<br />") {
            6
        } else if lower[i..].starts_with("<br>") {
            4
        } else {
            0
        };
        if br_len > 0 {
            out.push_str(&s[start..i]);
            out.push('\n');
            i += br_len;
            start = i;
            continue;
        }

        let opens_tag = lower_bytes
            .get(i + 1)
            .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/');
        match lower[i..].find('>') {
            Some(close) if opens_tag => {
                out.push_str(&s[start..i]);
                i += close + 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&s[start..]);
    out
}

/// Maximum display width among `\n`-separated lines.
pub fn multiline_width(s: &str) -> usize {
    s.split('\n').map(display_width).max().unwrap_or(0)
}

/// Number of `\n`-separated lines (an empty string is one line).
pub fn line_count(s: &str) -> usize {
    s.split('\n').count()
}
