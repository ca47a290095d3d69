use crate::error::TraceParseError;
use crate::stats::Operation;

/// Longest accepted trace line, without its terminator. Room for the operation, a separator, and a
/// `0x` prefixed 64 bit address
pub const MAX_LINE_WIDTH: usize = 20;

/// Offset of the address within a trace line
pub const ADDRESS_OFFSET: usize = 2;

/// One record of a trace
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub operation: Operation,
    pub address: u64,
}

impl AccessRequest {
    pub fn load(address: u64) -> Self {
        Self { operation: Operation::Load, address }
    }

    pub fn store(address: u64) -> Self {
        Self { operation: Operation::Store, address }
    }

    pub fn idle() -> Self {
        Self { operation: Operation::Idle, address: 0 }
    }
}

/// Parses a single trace line, without its newline
///
/// The first character is `l` for a load or `s` for a store, and the hexadecimal address starts at
/// [`ADDRESS_OFFSET`], with or without a `0x` prefix. Empty lines, and lines starting with NUL, are
/// idle padding
///
/// # Arguments
///
/// * `line`: The raw line, a trailing `\r` is ignored
/// * `line_number`: 1-based position in the trace, for error messages
///
/// returns: Result<AccessRequest, TraceParseError>
///
/// # Examples
///
/// ```
/// use victimlib::trace::{parse_line, AccessRequest};
/// assert_eq!(parse_line(b"l 0x1fffff50", 1), Ok(AccessRequest::load(0x1fff_ff50)));
/// assert_eq!(parse_line(b"s 7fff5a0c", 2), Ok(AccessRequest::store(0x7fff_5a0c)));
/// assert_eq!(parse_line(b"", 3), Ok(AccessRequest::idle()));
/// ```
pub fn parse_line(line: &[u8], line_number: usize) -> Result<AccessRequest, TraceParseError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() > MAX_LINE_WIDTH {
        return Err(TraceParseError::LineTooLong { line: line_number, length: line.len(), max: MAX_LINE_WIDTH });
    }
    let operation = match line.first() {
        None | Some(0) => return Ok(AccessRequest::idle()),
        Some(b'l') => Operation::Load,
        Some(b's') => Operation::Store,
        Some(&other) => return Err(TraceParseError::UnknownOperation { line: line_number, op: other as char }),
    };
    let address = parse_address(line.get(ADDRESS_OFFSET..).unwrap_or_default())
        .ok_or_else(|| TraceParseError::InvalidAddress {
            line: line_number,
            text: String::from_utf8_lossy(line).into_owned(),
        })?;
    Ok(AccessRequest { operation, address })
}

fn parse_address(text: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(text).ok()?.trim();
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Iterates over the records of a whole trace held in memory
///
/// Reads from the byte slice are sequential, so a memory map advised for sequential access works
/// well as the source
pub struct Records<'a> {
    remaining: &'a [u8],
    line_number: usize,
}

impl<'a> Records<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes, line_number: 0 }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<AccessRequest, TraceParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        // A terminating newline doesn't start another record
        if self.remaining.is_empty() {
            return None;
        }
        self.line_number += 1;
        let (line, rest) = match self.remaining.iter().position(|&b| b == b'\n') {
            Some(end) => (&self.remaining[..end], &self.remaining[end + 1..]),
            None => (self.remaining, &self.remaining[self.remaining.len()..]),
        };
        self.remaining = rest;
        Some(parse_line(line, self.line_number))
    }
}

/// Parses every record of a trace, stopping at the first bad line
pub fn parse_trace(bytes: &[u8]) -> Result<Vec<AccessRequest>, TraceParseError> {
    Records::new(bytes).collect()
}
