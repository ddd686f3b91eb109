//! Table file line format
//!
//! ```text
//! live:       <decimal id> \t <payload bytes> \n
//! tombstone:  X X X ... X \n          (same length as the line it replaced)
//! ```
//!
//! The id always starts at byte 0 so the scan can extract it without looking
//! at the payload. `X` is never a digit, so one byte tells a tombstone from a
//! live line.

use crate::error::{HareError, Result};

/// Filler byte of a tombstoned line
pub(crate) const TOMBSTONE_BYTE: u8 = b'X';

/// Separates the id from the payload
pub(crate) const SEPARATOR: u8 = b'\t';

/// Line terminator
pub(crate) const TERMINATOR: u8 = b'\n';

/// Longest decimal rendering of a u64
const MAX_ID_DIGITS: usize = 20;

/// A parsed table file line
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Live { id: u64, payload: &'a [u8] },
    Tombstone,
}

/// Encode a live line for `id`
pub(crate) fn encode(id: u64, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.contains(&TERMINATOR) {
        return Err(HareError::InvalidRecord(format!(
            "payload for record {} contains a line terminator",
            id
        )));
    }

    let id = id.to_string();
    let mut line = Vec::with_capacity(id.len() + payload.len() + 2);
    line.extend_from_slice(id.as_bytes());
    line.push(SEPARATOR);
    line.extend_from_slice(payload);
    line.push(TERMINATOR);

    Ok(line)
}

/// Filler line of exactly `len` bytes, terminator included
pub(crate) fn tombstone(len: usize) -> Vec<u8> {
    let mut line = vec![TOMBSTONE_BYTE; len];
    if let Some(last) = line.last_mut() {
        *last = TERMINATOR;
    }
    line
}

/// Parse one line, terminator included.
///
/// The error is a human-readable reason; callers attach table and offset.
pub(crate) fn parse(line: &[u8]) -> std::result::Result<Line<'_>, String> {
    let body = match line.split_last() {
        Some((&TERMINATOR, body)) => body,
        _ => return Err("unterminated line".to_string()),
    };

    match body.first() {
        None => return Err("empty line".to_string()),
        Some(&TOMBSTONE_BYTE) => return Ok(Line::Tombstone),
        Some(_) => {}
    }

    let sep = body
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or_else(|| "missing id separator".to_string())?;
    let digits = &body[..sep];

    if digits.is_empty() || digits.len() > MAX_ID_DIGITS || !digits.iter().all(u8::is_ascii_digit)
    {
        return Err(format!(
            "invalid record id {:?}",
            String::from_utf8_lossy(digits)
        ));
    }

    // All ASCII digits, so the str conversion cannot fail
    let id: u64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "record id out of range".to_string())?;

    if id == 0 {
        return Err("record id 0 is reserved".to_string());
    }

    Ok(Line::Live {
        id,
        payload: &body[sep + 1..],
    })
}
