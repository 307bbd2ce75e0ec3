// vim: tw=80
//! Buffer fill patterns and the byte-exact comparison oracle

use rand::{RngCore, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::{
    fmt,
    ops::Range,
    str::FromStr,
};
use thiserror::Error;
use tracing::debug;

/// Byte written over the whole range before the scattered payload, so that
/// stale data can't masquerade as a successful read.
pub const SENTINEL: u8 = b'!';

/// Seed used by [`Pattern::RandK`]
const RANDK_SEED: u64 = 0x6c62_6c6b_5eed;

/// Mismatch reports list at most this many ranges
const MAX_REPORTED_RANGES: usize = 8;

/// Content generators for I/O buffers
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Pattern {
    /// Repeating `A` to `Z`
    #[default]
    Anum,
    /// All zeros
    Zero,
    /// Pseudo-random bytes from a known seed.  Reproducible.
    RandK,
    /// Random bytes seeded from the OS.  Differs every time.
    RandT,
}

impl Pattern {
    /// Fill `buf` with this pattern.
    ///
    /// The pattern always starts at offset 0 of `buf`.
    pub fn fill(self, buf: &mut [u8]) {
        match self {
            Pattern::Anum => {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = b'A' + (i % 26) as u8;
                }
            }
            Pattern::Zero => buf.fill(0),
            Pattern::RandK => XorShiftRng::seed_from_u64(RANDK_SEED)
                .fill_bytes(buf),
            Pattern::RandT => rand::thread_rng().fill_bytes(buf),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Pattern::Anum => "anum",
            Pattern::Zero => "zero",
            Pattern::RandK => "rand-k",
            Pattern::RandT => "rand-t",
        };
        s.fmt(f)
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Unknown pattern {0:?}.  Expected one of anum, zero, rand-k, rand-t")]
pub struct ParsePatternError(String);

impl FromStr for Pattern {
    type Err = ParsePatternError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "anum" => Ok(Pattern::Anum),
            "zero" => Ok(Pattern::Zero),
            "rand-k" => Ok(Pattern::RandK),
            "rand-t" => Ok(Pattern::RandT),
            _ => Err(ParsePatternError(s.to_owned()))
        }
    }
}

/// The result of comparing two buffers that turned out to differ.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mismatch {
    /// Number of bytes compared
    pub nbytes: usize,
    /// Number of bytes that differ
    pub ndiff: usize,
    /// Maximal runs of differing bytes, in ascending order
    pub ranges: Vec<Range<usize>>,
}

impl Mismatch {
    /// Offset of the first differing byte
    pub fn first(&self) -> usize {
        self.ranges[0].start
    }

    /// Log a hexdump of the block containing the first difference.
    ///
    /// `blk_nbytes` is the granularity of the dump, usually one LBA.
    pub fn dump(&self, expected: &[u8], actual: &[u8], blk_nbytes: usize) {
        let blk = self.first() / blk_nbytes;
        let blk_range = blk * blk_nbytes
            ..((blk + 1) * blk_nbytes).min(expected.len()).min(actual.len());
        debug!(blk, offset = blk_range.start, "expected:");
        for line in hexdump::hexdump_iter(&expected[blk_range.clone()]) {
            debug!("{line}");
        }
        debug!(blk, offset = blk_range.start, "actual:");
        for line in hexdump::hexdump_iter(&actual[blk_range]) {
            debug!("{line}");
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} bytes differ in {} range(s):", self.ndiff,
               self.nbytes, self.ranges.len())?;
        for r in self.ranges.iter().take(MAX_REPORTED_RANGES) {
            write!(f, " [{:#x}, {:#x})", r.start, r.end)?;
        }
        if self.ranges.len() > MAX_REPORTED_RANGES {
            write!(f, " ...")?;
        }
        Ok(())
    }
}

/// Compare two buffers byte for byte.
///
/// Returns `None` if they're identical.  Buffers of different lengths are
/// compared over the shorter length, and the excess counts as differing.
pub fn diff(a: &[u8], b: &[u8]) -> Option<Mismatch> {
    let nbytes = a.len().max(b.len());
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut ndiff = 0;
    let differing = a.iter().zip(b.iter())
        .enumerate()
        .filter(|(_, (x, y))| x != y)
        .map(|(i, _)| i)
        .chain(a.len().min(b.len())..nbytes);
    for i in differing {
        ndiff += 1;
        match ranges.last_mut() {
            Some(r) if r.end == i => r.end += 1,
            _ => ranges.push(i..i + 1)
        }
    }
    if ndiff == 0 {
        None
    } else {
        Some(Mismatch{nbytes, ndiff, ranges})
    }
}

// LCOV_EXCL_STOP
