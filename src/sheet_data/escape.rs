//! XML escaping for text nodes of the sheet data fragment
//!
//! Besides the usual markup characters, line breaks and tabs are written as
//! character references so they survive attribute-value normalisation in
//! readers, characters that are illegal in XML 1.0 are replaced by `?`, and
//! everything else outside ASCII is written as a decimal character reference.
//! Characters outside the Basic Multilingual Plane take two UTF-16 code units
//! and become one `?` per unit.

use std::borrow::Cow;
use std::io::{self, Write};

/// Replacement for characters that cannot appear in an XML document
const INVALID_CHAR_REPLACEMENT: &[u8] = b"?";
/// Replacement for a surrogate pair, one `?` per code unit
const SURROGATE_PAIR_REPLACEMENT: &[u8] = b"??";

/// Replacement for `c`, or `None` when it is copied verbatim
#[inline]
fn replacement(c: char) -> Option<Replacement> {
    let r = match c {
        '<' => Replacement::Static(b"&lt;"),
        '>' => Replacement::Static(b"&gt;"),
        '&' => Replacement::Static(b"&amp;"),
        '"' => Replacement::Static(b"&quot;"),
        '\n' | '\r' => Replacement::Static(b"&#xa;"),
        '\t' => Replacement::Static(b"&#x9;"),
        '\u{a0}' => Replacement::Static(b"&#xa0;"),
        c if c < ' ' || c == '\u{fffe}' || c == '\u{ffff}' => {
            Replacement::Static(INVALID_CHAR_REPLACEMENT)
        }
        c if c > '\u{ffff}' => Replacement::Static(SURROGATE_PAIR_REPLACEMENT),
        c if c as u32 > 127 => Replacement::CharRef(c as u32),
        _ => return None,
    };
    Some(r)
}

enum Replacement {
    Static(&'static [u8]),
    CharRef(u32),
}

impl Replacement {
    fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Replacement::Static(bytes) => out.write_all(bytes),
            Replacement::CharRef(code) => {
                let mut num = itoa::Buffer::new();
                out.write_all(b"&#")?;
                out.write_all(num.format(*code).as_bytes())?;
                out.write_all(b";")
            }
        }
    }
}

/// Write `text` escaped for use inside an XML text node.
///
/// Unescaped runs are written with a single call each.
pub fn escape_into<W: Write + ?Sized>(text: &str, out: &mut W) -> io::Result<()> {
    let bytes = text.as_bytes();
    let mut last = 0;

    for (idx, c) in text.char_indices() {
        if let Some(r) = replacement(c) {
            if idx > last {
                out.write_all(&bytes[last..idx])?;
            }
            r.write_to(out)?;
            last = idx + c.len_utf8();
        }
    }

    if last < bytes.len() {
        out.write_all(&bytes[last..])?;
    }
    Ok(())
}

/// Escape `text` for an XML text node, borrowing when nothing needs to change
///
/// # Examples
///
/// ```
/// use excelsplice::sheet_data::escape;
///
/// assert_eq!(escape("a<b"), "a&lt;b");
/// assert_eq!(escape("plain"), "plain");
/// assert_eq!(escape("café"), "caf&#233;");
/// ```
pub fn escape(text: &str) -> Cow<'_, str> {
    let Some(first) = text.char_indices().find(|&(_, c)| replacement(c).is_some()) else {
        return Cow::Borrowed(text);
    };

    let mut out = Vec::with_capacity(text.len() + 16);
    out.extend_from_slice(&text.as_bytes()[..first.0]);
    // Writing into a Vec cannot fail
    let _ = escape_into(&text[first.0..], &mut out);
    // Only ASCII was added to valid UTF-8 input
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

/// Whether the text needs `xml:space="preserve"` on its `<t>` element.
///
/// Looks at the raw, unescaped value: leading or trailing whitespace would
/// otherwise be dropped by readers.
pub fn needs_space_preserve(text: &str) -> bool {
    match (text.chars().next(), text.chars().next_back()) {
        (Some(first), Some(last)) => first.is_whitespace() || last.is_whitespace(),
        _ => false,
    }
}
