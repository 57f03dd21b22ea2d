//! Terminal output normalization for audit logs.
//!
//! Interactive installers write progress bars and spinners with carriage
//! returns and cursor-control escapes. Replaying those verbatim makes the
//! audit log unreadable, so this module reconstructs what a person
//! watching the live terminal would have seen as static scrollback: only
//! the final write to each line survives.
//!
//! The whole transformation is one pure function; none of the individual
//! rules leak to callers.

use once_cell::sync::Lazy;
use regex::Regex;

const ESC: char = '\u{1b}';

/// Cursor-up + erase-to-end-of-line + literal `e`: a redraw idiom some
/// progress indicators emit, collapsed to a line break.
static REDRAW_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{1b}\\[A.+?\u{1b}\\[Ke").expect("static pattern"));

/// Echoed-command lines get a distinct style in the audit log.
static COMMAND_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\$> (.+)").expect("static pattern"));

/// Exit status lines likewise.
static EXIT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(Exit status: .+)").expect("static pattern"));

/// Normalize a raw captured terminal stream into canonical log text.
///
/// Idempotent: running it again over its own output changes nothing.
pub fn normalize(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\r' {
            out.push(c);
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let prev = if i >= 1 { Some(chars[i - 1]) } else { None };

        if next == Some(ESC) && is_cursor_nav(&chars, i + 1) {
            // The terminal is repositioning to redraw; swallow the
            // navigation sequences and keep scanning past them.
            i += 1;
            while is_cursor_nav(&chars, i) {
                i += 3;
            }
        } else if next == Some('\n') {
            // CRLF is a plain line ending.
            out.push('\n');
            i += 2;
        } else if next.is_some() && next == prev {
            // Degenerate redraw of the character just written.
            i += 2;
        } else {
            // Return to column zero and overwrite: only the last write
            // to the current line survives.
            match out.rfind('\n') {
                Some(pos) => out.truncate(pos + 1),
                None => out.clear(),
            }
            i += 1;
        }
    }

    let text = REDRAW_MARKER.replace_all(&out, "\n");
    let text = COMMAND_LINE.replace_all(&text, "\u{1b}[37m$$> ${1}\u{1b}[0m");
    let text = EXIT_LINE.replace_all(&text, "\u{1b}[36m${1}\u{1b}[0m");
    text.into_owned()
}

/// Normalize a sequence of raw output chunks as one stream.
pub fn normalize_chunks<I, S>(chunks: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut raw = String::new();
    for chunk in chunks {
        raw.push_str(chunk.as_ref());
    }
    normalize(&raw)
}

/// Whether a parameterless cursor-navigation sequence (`ESC [ A/B/C/D/K`)
/// starts at `i`.
fn is_cursor_nav(chars: &[char], i: usize) -> bool {
    chars.get(i).copied() == Some(ESC)
        && chars.get(i + 1).copied() == Some('[')
        && matches!(chars.get(i + 2), Some('A' | 'B' | 'C' | 'D' | 'K'))
}
