//! `Range` header handling for byte-addressable downloads.
//!
//! Only the `bytes` unit is understood. Ranges are checked strictly against
//! the representation length: anything reaching outside `[0, len)` is
//! unsatisfiable rather than clamped.

use smm_core::{Error, Result};

/// An inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    fn touches(&self, other: &ByteRange) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }

    fn merge(&mut self, other: &ByteRange) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
    }
}

/// Parse `header` against a representation of `len` bytes.
///
/// Overlapping and adjacent ranges are combined; the result keeps the order
/// in which each combined range first appeared in the header.
pub fn parse(header: &str, len: u64) -> Result<Vec<ByteRange>> {
    let (unit, set) = header.trim().split_once('=').ok_or(Error::MalformedRange)?;
    let unit = unit.trim();
    if unit != "bytes" {
        return Err(Error::UnknownRangeType(unit.to_string()));
    }

    let mut ranges = Vec::new();
    for part in set.split(',') {
        ranges.push(parse_one(part.trim(), len)?);
    }
    Ok(coalesce(ranges))
}

fn parse_one(part: &str, len: u64) -> Result<ByteRange> {
    let (start, end) = part.split_once('-').ok_or(Error::MalformedRange)?;
    let (start, end) = (start.trim(), end.trim());
    let number = |s: &str| s.parse::<u64>().map_err(|_| Error::MalformedRange);
    let unsatisfiable = Error::UnsatisfiableRange { length: len };

    let range = match (start.is_empty(), end.is_empty()) {
        (true, true) => return Err(Error::MalformedRange),
        // Suffix: the last `n` bytes.
        (true, false) => {
            let n = number(end)?;
            if n == 0 || n > len {
                return Err(unsatisfiable);
            }
            ByteRange {
                start: len - n,
                end: len - 1,
            }
        }
        (false, true) => {
            let start = number(start)?;
            if start >= len {
                return Err(unsatisfiable);
            }
            ByteRange { start, end: len - 1 }
        }
        (false, false) => ByteRange {
            start: number(start)?,
            end: number(end)?,
        },
    };

    if range.start > range.end || range.end >= len {
        return Err(unsatisfiable);
    }
    Ok(range)
}

fn coalesce(ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    let mut out: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        out.push(range);
        // A merge can make an earlier range touch a later one; fold until stable.
        loop {
            let pair = (0..out.len())
                .flat_map(|i| (i + 1..out.len()).map(move |j| (i, j)))
                .find(|&(i, j)| out[i].touches(&out[j]));
            let Some((i, j)) = pair else { break };
            let later = out.remove(j);
            out[i].merge(&later);
        }
    }
    out
}

/// Concatenate the bytes selected by `header` from `buf`.
pub fn slice(buf: &[u8], header: &str) -> Result<Vec<u8>> {
    let ranges = parse(header, buf.len() as u64)?;
    let total = ranges.iter().map(ByteRange::len).sum::<u64>() as usize;
    let mut out = Vec::with_capacity(total);
    for r in ranges {
        out.extend_from_slice(&buf[r.start as usize..=r.end as usize]);
    }
    Ok(out)
}
