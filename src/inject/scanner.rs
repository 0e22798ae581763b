//! Finite-state scanner locating the `<sheetData>` placeholder of a worksheet part
//!
//! The scanner is fed the raw bytes of the part in chunks of any size and
//! copies everything that is not part of the placeholder to a sink. Matching
//! works on bytes: both tag literals are ASCII, and UTF-8 never uses ASCII
//! bytes inside multi-byte sequences.

use std::io::{self, Write};

pub const OPEN_TAG: &[u8] = b"<sheetData";
pub const CLOSE_TAG: &[u8] = b"</sheetData>";

/// Form of the placeholder found in the template part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `<sheetData>...</sheetData>`; the open tag was copied, the close tag swallowed
    Paired,
    /// `<sheetData/>`, swallowed entirely
    SelfClosing,
    /// `<sheetData>` without a closing tag before the end of the part
    Unclosed,
    /// No usable `<sheetData` marker in the part
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Matching the open literal; 0 means plain copying
    MatchingOpen(usize),
    /// Full `<sheetData` seen, next byte decides the form
    AfterOpenLookahead,
    /// `<sheetData/` seen, expecting `>`
    AfterSelfClosingSlash,
    /// Inside a paired element, matching the close literal
    MatchingClose(usize),
    Done(Placeholder),
}

/// Result of feeding one chunk to the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// The whole chunk was consumed, the placeholder end is still ahead
    NeedMore,
    /// The placeholder ended after `consumed` bytes of the chunk; the rest of
    /// the chunk has not been written
    Found {
        consumed: usize,
        placeholder: Placeholder,
    },
}

/// Byte-level automaton for `<sheetData>` / `<sheetData/>`.
///
/// The backtrack buffer of a partial match is always a prefix of the literal
/// being matched, so it is replayed from the literal itself.
///
/// # Examples
///
/// ```
/// use excelsplice::inject::scanner::{Placeholder, PlaceholderScanner, Scan};
///
/// let mut scanner = PlaceholderScanner::new();
/// let mut out = Vec::new();
/// let scan = scanner.feed(b"<worksheet><sheetData/></worksheet>", &mut out)?;
///
/// assert_eq!(scan, Scan::Found { consumed: 23, placeholder: Placeholder::SelfClosing });
/// assert_eq!(out, b"<worksheet>");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PlaceholderScanner {
    state: State,
    open_tag_written: bool,
}

impl Default for PlaceholderScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderScanner {
    pub fn new() -> Self {
        PlaceholderScanner {
            state: State::MatchingOpen(0),
            open_tag_written: false,
        }
    }

    /// Whether `<sheetData>` has already been copied to the sink
    pub fn open_tag_written(&self) -> bool {
        self.open_tag_written
    }

    /// Placeholder form, once scanning has stopped
    pub fn placeholder(&self) -> Option<Placeholder> {
        match self.state {
            State::Done(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    /// Scan `input`, copying pass-through bytes to `out`.
    ///
    /// Returns [`Scan::Found`] as soon as the placeholder ends. Feeding after
    /// that point consumes nothing.
    pub fn feed<W: Write + ?Sized>(&mut self, input: &[u8], out: &mut W) -> io::Result<Scan> {
        let mut i = 0;

        while i < input.len() {
            match self.state {
                State::Done(placeholder) => {
                    return Ok(Scan::Found {
                        consumed: i,
                        placeholder,
                    })
                }
                State::MatchingOpen(0) | State::MatchingClose(0) => {
                    // Copy the run up to the next candidate in one write
                    let run = input[i..]
                        .iter()
                        .position(|&b| b == b'<')
                        .unwrap_or(input.len() - i);
                    if run > 0 {
                        out.write_all(&input[i..i + run])?;
                        i += run;
                        continue;
                    }
                    self.step(input[i], out)?;
                }
                _ => self.step(input[i], out)?,
            }
            i += 1;
        }

        Ok(match self.state {
            State::Done(placeholder) => Scan::Found {
                consumed: i,
                placeholder,
            },
            _ => Scan::NeedMore,
        })
    }

    /// End of input: replay any pending partial match verbatim.
    ///
    /// A truncated or missing placeholder is tolerated; the caller synthesizes
    /// the element instead.
    pub fn finish<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<Placeholder> {
        let placeholder = match self.state {
            State::Done(placeholder) => return Ok(placeholder),
            State::MatchingOpen(pos) => {
                out.write_all(&OPEN_TAG[..pos])?;
                Placeholder::Missing
            }
            State::AfterOpenLookahead => {
                out.write_all(OPEN_TAG)?;
                Placeholder::Missing
            }
            State::AfterSelfClosingSlash => {
                out.write_all(OPEN_TAG)?;
                out.write_all(b"/")?;
                Placeholder::Missing
            }
            State::MatchingClose(pos) => {
                out.write_all(&CLOSE_TAG[..pos])?;
                Placeholder::Unclosed
            }
        };
        self.state = State::Done(placeholder);
        Ok(placeholder)
    }

    fn step<W: Write + ?Sized>(&mut self, byte: u8, out: &mut W) -> io::Result<()> {
        self.state = match self.state {
            State::MatchingOpen(pos) => match_literal(OPEN_TAG, pos, byte, out)?
                .map(State::MatchingOpen)
                .unwrap_or(State::AfterOpenLookahead),
            State::AfterOpenLookahead => match byte {
                b'>' => {
                    out.write_all(OPEN_TAG)?;
                    out.write_all(b">")?;
                    self.open_tag_written = true;
                    State::MatchingClose(0)
                }
                b'/' => State::AfterSelfClosingSlash,
                other => {
                    // e.g. `<sheetData x="1">` or `<sheetDataX`
                    out.write_all(OPEN_TAG)?;
                    State::MatchingOpen(restart_open(other, out)?)
                }
            },
            State::AfterSelfClosingSlash => match byte {
                b'>' => State::Done(Placeholder::SelfClosing),
                other => {
                    out.write_all(OPEN_TAG)?;
                    out.write_all(b"/")?;
                    State::MatchingOpen(restart_open(other, out)?)
                }
            },
            State::MatchingClose(pos) => match_literal(CLOSE_TAG, pos, byte, out)?
                .map(State::MatchingClose)
                .unwrap_or(State::Done(Placeholder::Paired)),
            State::Done(placeholder) => State::Done(placeholder),
        };
        Ok(())
    }
}

/// Start matching the open literal afresh at `byte`
// deliberate: the peeked byte is retested instead of copied, so a `<` that
// ends a failed lookahead can still begin the placeholder (DESIGN.md)
fn restart_open<W: Write + ?Sized>(byte: u8, out: &mut W) -> io::Result<usize> {
    Ok(match_literal(OPEN_TAG, 0, byte, out)?.unwrap_or(0))
}

/// Advance a match of `literal` at `pos` with `byte`.
///
/// Returns the new match position, or `None` once the literal is complete.
/// On mismatch the matched prefix is flushed and `byte` is retried as the
/// start of a new match. Neither literal repeats its first byte, so a single
/// retry is enough.
fn match_literal<W: Write + ?Sized>(
    literal: &[u8],
    pos: usize,
    byte: u8,
    out: &mut W,
) -> io::Result<Option<usize>> {
    if byte == literal[pos] {
        let next = pos + 1;
        return Ok((next < literal.len()).then_some(next));
    }

    if pos > 0 {
        out.write_all(&literal[..pos])?;
    }
    if byte == literal[0] {
        Ok(Some(1))
    } else {
        out.write_all(&[byte])?;
        Ok(Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run the scanner over `input` split into `chunk`-sized pieces.
    /// Returns (output, placeholder, unconsumed remainder).
    fn scan_chunked(input: &[u8], chunk: usize) -> (String, Placeholder, String) {
        let mut scanner = PlaceholderScanner::new();
        let mut out = Vec::new();

        for (n, piece) in input.chunks(chunk).enumerate() {
            if let Scan::Found {
                consumed,
                placeholder,
            } = scanner.feed(piece, &mut out).unwrap()
            {
                let mut rest = piece[consumed..].to_vec();
                for later in input.chunks(chunk).skip(n + 1) {
                    rest.extend_from_slice(later);
                }
                return (
                    String::from_utf8(out).unwrap(),
                    placeholder,
                    String::from_utf8(rest).unwrap(),
                );
            }
        }

        let placeholder = scanner.finish(&mut out).unwrap();
        (String::from_utf8(out).unwrap(), placeholder, String::new())
    }

    fn scan_all_chunkings(input: &str) -> (String, Placeholder, String) {
        let expected = scan_chunked(input.as_bytes(), input.len().max(1));
        for chunk in 1..=input.len().max(1) {
            assert_eq!(
                scan_chunked(input.as_bytes(), chunk),
                expected,
                "chunk size {chunk}"
            );
        }
        expected
    }

    #[test]
    fn test_self_closing() {
        let (out, placeholder, rest) =
            scan_all_chunkings("<worksheet><dimension ref=\"A1\"/><sheetData/><pageMargins/></worksheet>");
        assert_eq!(out, "<worksheet><dimension ref=\"A1\"/>");
        assert_eq!(placeholder, Placeholder::SelfClosing);
        assert_eq!(rest, "<pageMargins/></worksheet>");
    }

    #[test]
    fn test_paired_keeps_open_tag_and_inner_content() {
        let (out, placeholder, rest) =
            scan_all_chunkings("<ws><sheetData><row r=\"1\"/></sheetData></ws>");
        assert_eq!(out, "<ws><sheetData><row r=\"1\"/>");
        assert_eq!(placeholder, Placeholder::Paired);
        assert_eq!(rest, "</ws>");
    }

    #[test]
    fn test_empty_paired() {
        let mut scanner = PlaceholderScanner::new();
        let mut out = Vec::new();
        let scan = scanner
            .feed(b"<ws><sheetData></sheetData></ws>", &mut out)
            .unwrap();

        assert_eq!(
            scan,
            Scan::Found {
                consumed: 27,
                placeholder: Placeholder::Paired
            }
        );
        assert!(scanner.open_tag_written());
        assert_eq!(out, b"<ws><sheetData>");
    }

    #[test]
    fn test_partial_matches_are_replayed() {
        let (out, placeholder, rest) =
            scan_all_chunkings("<sheet<sheetDat<<sheetData/>tail");
        assert_eq!(out, "<sheet<sheetDat<");
        assert_eq!(placeholder, Placeholder::SelfClosing);
        assert_eq!(rest, "tail");
    }

    #[test]
    fn test_partial_close_is_replayed() {
        let (out, placeholder, _) =
            scan_all_chunkings("<sheetData></sheet></sheetDat<</sheetData>");
        assert_eq!(out, "<sheetData></sheet></sheetDat<");
        assert_eq!(placeholder, Placeholder::Paired);
    }

    #[test]
    fn test_attribute_variant_is_not_a_placeholder() {
        let (out, placeholder, rest) = scan_all_chunkings("<sheetData x=\"1\"/><sheetDataX/>");
        assert_eq!(out, "<sheetData x=\"1\"/><sheetDataX/>");
        assert_eq!(placeholder, Placeholder::Missing);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_slash_without_gt_is_copied() {
        let (out, placeholder, _) = scan_all_chunkings("<sheetData/x><sheetData/>");
        assert_eq!(out, "<sheetData/x>");
        assert_eq!(placeholder, Placeholder::SelfClosing);
    }

    #[test]
    fn test_lookahead_restarts_on_new_tag() {
        let (out, placeholder, _) = scan_all_chunkings("<sheetData<sheetData/<sheetData/>");
        assert_eq!(out, "<sheetData<sheetData/");
        assert_eq!(placeholder, Placeholder::SelfClosing);
    }

    #[test]
    fn test_missing_marker_copies_everything() {
        let input = "<?xml version=\"1.0\"?><worksheet>caf\u{e9} <cols/></worksheet>";
        let (out, placeholder, rest) = scan_all_chunkings(input);
        assert_eq!(out, input);
        assert_eq!(placeholder, Placeholder::Missing);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_eof_inside_matches_flushes_buffer() {
        assert_eq!(
            scan_chunked(b"<ws><sheetDa", 3),
            ("<ws><sheetDa".to_string(), Placeholder::Missing, String::new())
        );
        assert_eq!(
            scan_chunked(b"<ws><sheetData", 5),
            ("<ws><sheetData".to_string(), Placeholder::Missing, String::new())
        );
        assert_eq!(
            scan_chunked(b"<ws><sheetData/", 1),
            ("<ws><sheetData/".to_string(), Placeholder::Missing, String::new())
        );
        assert_eq!(
            scan_chunked(b"<sheetData><row/></sheetDa", 4),
            (
                "<sheetData><row/></sheetDa".to_string(),
                Placeholder::Unclosed,
                String::new()
            )
        );
    }

    #[test]
    fn test_only_first_placeholder_is_used() {
        let (_, placeholder, rest) = scan_all_chunkings("<sheetData/><sheetData/>");
        assert_eq!(placeholder, Placeholder::SelfClosing);
        assert_eq!(rest, "<sheetData/>");
    }

    #[test]
    fn test_feed_after_done_consumes_nothing() {
        let mut scanner = PlaceholderScanner::new();
        let mut out = Vec::new();
        scanner.feed(b"<sheetData/>", &mut out).unwrap();

        let scan = scanner.feed(b"more", &mut out).unwrap();
        assert_eq!(
            scan,
            Scan::Found {
                consumed: 0,
                placeholder: Placeholder::SelfClosing
            }
        );
        assert_eq!(scanner.placeholder(), Some(Placeholder::SelfClosing));
        assert!(out.is_empty());
    }
}
