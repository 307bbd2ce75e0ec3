// vim: tw=80
//! Common utility functions used throughout lblk

use nix::unistd::{sysconf, SysconfVar};
use std::{
    num::ParseIntError,
    ops::{Add, Div, Mul},
};

/// Alignment used for DMA-capable buffers when the page size can't be
/// determined.
pub const DEFAULT_BUF_ALIGN: usize = 4096;

/// Divide two unsigned numbers (usually integers), rounding up.
///
/// Never overflows, even for a dividend near the type's maximum.
pub fn div_roundup<T>(dividend: T, divisor: T) -> T
    where T: Add<Output=T> + Copy + Div<Output=T> + From<u8> + Mul<Output=T> +
             PartialEq
{
    let q = dividend / divisor;
    if q * divisor == dividend {
        q
    } else {
        q + T::from(1u8)
    }
}

/// The system's page size, which is the alignment we use for I/O buffers.
pub fn page_size() -> usize {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(ps)) if ps > 0 => ps as usize,
        _ => DEFAULT_BUF_ALIGN
    }
}

/// Parse an LBA given on the command line.
///
/// Both decimal and `0x`-prefixed hexadecimal are accepted.
pub fn parse_lba(s: &str) -> Result<u64, ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    }
}

// LCOV_EXCL_STOP
