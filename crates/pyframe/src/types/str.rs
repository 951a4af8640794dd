//! String helpers: repr quoting and character indexing.

use std::fmt::{self, Write};

/// Writes a Python `repr()` of `s`.
///
/// Uses double quotes if the string contains single quotes but no double quotes, otherwise
/// single quotes with embedded single quotes escaped. Backslash, newline, tab and carriage
/// return are always escaped.
pub fn string_repr_fmt(s: &str, f: &mut impl Write) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// The character at a Python index (negative counts from the end), by code point.
pub(crate) fn char_at(s: &str, index: i64) -> Option<char> {
    let len = i64::try_from(s.chars().count()).ok()?;
    let index = if index < 0 { index + len } else { index };
    if index < 0 {
        return None;
    }
    s.chars().nth(usize::try_from(index).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repr(s: &str) -> String {
        let mut out = String::new();
        string_repr_fmt(s, &mut out).unwrap();
        out
    }

    #[test]
    fn quoting() {
        assert_eq!(repr("abc"), "'abc'");
        assert_eq!(repr("it's"), "\"it's\"");
        assert_eq!(repr("'\""), "'\\'\"'");
        assert_eq!(repr("a\nb"), "'a\\nb'");
    }

    #[test]
    fn indexing() {
        assert_eq!(char_at("héllo", 1), Some('é'));
        assert_eq!(char_at("hello", -1), Some('o'));
        assert_eq!(char_at("hello", 5), None);
        assert_eq!(char_at("hello", -6), None);
    }
}
