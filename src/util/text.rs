use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Strip terminal control characters and ANSI escape sequences.
///
/// Answer and comment text is user-controlled and printed straight to the
/// terminal. Tab, newline and carriage return are kept.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s
        .chars()
        .any(|c| c == '\x1b' || (c.is_control() && !matches!(c, '\t' | '\n' | '\r')));
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters until a final byte in '@'..='~'
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ESC '\'
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// One-line preview of `s` fitting in `max_width` terminal columns.
///
/// Control characters are stripped, runs of whitespace (including newlines)
/// collapse to one space, and overlong text ends in `...`. CJK characters
/// count as two columns.
pub fn preview(s: &str, max_width: usize) -> String {
    let clean = strip_control_chars(s);
    let line = clean.split_whitespace().collect::<Vec<_>>().join(" ");

    let total: usize = line.chars().map(char_width).sum();
    if total <= max_width {
        return line;
    }
    if max_width <= ELLIPSIS_WIDTH {
        return take_width(&line, max_width).to_string();
    }
    format!("{}{ELLIPSIS}", take_width(&line, max_width - ELLIPSIS_WIDTH))
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Longest prefix of `s` no wider than `width` columns.
fn take_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        used += char_width(c);
        if used > width {
            return &s[..idx];
        }
    }
    s
}
