//! Wire syntax: reserved characters, escaping, and frame-aware splitting.
//!
//! Splitting rules:
//! - `?` escapes the byte that follows it, whatever that byte is.
//! - `@<len>@` opens a binary frame; the next `len` bytes are opaque.
//! - A separator at the very end does not produce a trailing empty token.

use std::ops::Range;

use crate::error::{FintsError, Result, Violation};

/// Ends a segment.
pub const SEGMENT_TERMINATOR: u8 = b'\'';
/// Separates data elements within a segment.
pub const ELEMENT_SEPARATOR: u8 = b'+';
/// Separates group members within a data element.
pub const GROUP_SEPARATOR: u8 = b':';
/// Escape prefix.
pub const ESCAPE: u8 = b'?';
/// Opens and closes a binary length header.
pub const BINARY_MARKER: u8 = b'@';

const RESERVED: [u8; 5] = [ESCAPE, GROUP_SEPARATOR, ELEMENT_SEPARATOR, SEGMENT_TERMINATOR, BINARY_MARKER];

/// True for the five characters that must be escaped inside text.
pub fn is_reserved(b: u8) -> bool {
    RESERVED.contains(&b)
}

/// Encode text as ISO-8859-1 and escape reserved characters.
pub fn escape(text: &str) -> std::result::Result<Vec<u8>, Violation> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        let b = latin1_byte(c)?;
        if is_reserved(b) {
            out.push(ESCAPE);
        }
        out.push(b);
    }
    Ok(out)
}

/// Remove escape prefixes and decode ISO-8859-1 into a `String`.
///
/// A `?` only escapes a reserved character; any other `?` is kept literally.
pub fn unescape(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b == ESCAPE {
            if let Some(&next) = raw.get(i + 1) {
                if is_reserved(next) {
                    out.push(char::from(next));
                    i += 2;
                    continue;
                }
            }
        }
        out.push(char::from(b));
        i += 1;
    }
    out
}

/// ISO-8859-1 bytes for `text` without escaping.
pub fn latin1(text: &str) -> std::result::Result<Vec<u8>, Violation> {
    text.chars().map(latin1_byte).collect()
}

/// Decode ISO-8859-1 bytes (every byte maps to one char).
pub fn from_latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| char::from(b)).collect()
}

fn latin1_byte(c: char) -> std::result::Result<u8, Violation> {
    u8::try_from(u32::from(c)).map_err(|_| Violation::NotRepresentable(c))
}

/// Split `input` on `sep`, honoring escapes and binary frames.
pub fn split(input: &[u8], sep: u8) -> Result<Vec<&[u8]>> {
    Ok(split_ranges(input, sep)?
        .into_iter()
        .map(|r| &input[r])
        .collect())
}

/// Same as [`split`], but yields byte ranges into `input`.
pub fn split_ranges(input: &[u8], sep: u8) -> Result<Vec<Range<usize>>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < input.len() {
        let b = input[i];
        if b == ESCAPE {
            i += 2;
            continue;
        }
        if b == BINARY_MARKER {
            if let Some((payload_start, len)) = binary_header(input, i) {
                i = frame_end(input, payload_start, len)?;
                continue;
            }
        } else if b == sep {
            out.push(start..i);
            start = i + 1;
        }
        i += 1;
    }

    if start < input.len() {
        out.push(start..input.len());
    }
    Ok(out)
}

/// Parse `@<digits>@` at `at`. Returns payload offset and length.
///
/// `@0@` is a valid header with an empty payload.
pub(crate) fn binary_header(input: &[u8], at: usize) -> Option<(usize, usize)> {
    let rest = input.get(at + 1..)?;
    let close = rest.iter().position(|&b| b == BINARY_MARKER)?;
    let digits = &rest[..close];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let len: usize = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((at + close + 2, len))
}

/// End offset of a frame whose payload starts at `payload_start`.
///
/// The announced length comes off the wire; it must fit inside `input`.
pub(crate) fn frame_end(input: &[u8], payload_start: usize, len: usize) -> Result<usize> {
    payload_start
        .checked_add(len)
        .filter(|&end| end <= input.len())
        .ok_or_else(|| {
            FintsError::decode(
                "binary",
                Violation::Malformed(format!(
                    "frame announces {len} bytes but only {} remain",
                    input.len().saturating_sub(payload_start)
                )),
            )
        })
}

/// Byte offset of the first unescaped `sep` outside binary frames.
///
/// Stops at the first match; text after it is not validated.
pub fn find_unescaped(input: &[u8], sep: u8) -> Result<Option<usize>> {
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            ESCAPE => i += 2,
            BINARY_MARKER => match binary_header(input, i) {
                Some((payload_start, len)) => i = frame_end(input, payload_start, len)?,
                None => i += 1,
            },
            b if b == sep => return Ok(Some(i)),
            _ => i += 1,
        }
    }
    Ok(None)
}
