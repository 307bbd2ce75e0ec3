// vim: tw=80
//! The command interface that the verifiers drive

use crate::{buf::DmaBuf, types::*};
#[cfg(test)] use mockall::automock;
use nix::errno::Errno;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single device command.
///
/// `Err` is a transport-level failure: the command never completed.  `Ok`
/// carries the device's completion status, which may itself be a failure.
pub type CmdResult = std::result::Result<Status, Errno>;

/// Device geometry, as far as lblk cares.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Geometry {
    /// Namespace identifier that commands should be addressed to
    pub nsid: Nsid,
    /// Capacity of the namespace in LBAs
    pub nlba: LbaT,
    /// Size of one LBA in bytes.  Never zero.
    pub lba_nbytes: u32,
    /// Maximum data transfer size of a single command in bytes.  Zero means
    /// "no limit".
    pub mdts_nbytes: u32,
}

impl Geometry {
    /// Total capacity in bytes
    pub fn tbytes(&self) -> u64 {
        self.nlba * u64::from(self.lba_nbytes)
    }

    /// The most LBAs a single command may transfer, if limited
    pub fn mdts_naddr(&self) -> Option<u64> {
        match self.mdts_nbytes {
            0 => None,
            mdts_nbytes => Some(u64::from(mdts_nbytes / self.lba_nbytes))
        }
    }

    /// Check a read or write the way a controller would, before any data
    /// moves.
    ///
    /// Returns `Ok(Status::SUCCESS)` if the command may proceed.
    pub fn validate_io(&self, slba: LbaT, nlb: u16, buf_nbytes: usize)
        -> CmdResult
    {
        let naddr = u64::from(nlb) + 1;
        if buf_nbytes < naddr as usize * self.lba_nbytes as usize {
            return Err(Errno::EINVAL);
        }
        if self.mdts_naddr().is_some_and(|mdts_naddr| naddr > mdts_naddr) {
            return Ok(Status::INVALID_FIELD);
        }
        Ok(self.validate_lbas(slba, naddr))
    }

    /// Check a simple-copy command, before any data moves.
    ///
    /// Returns `Ok(Status::SUCCESS)` if the command may proceed.
    pub fn validate_scopy(&self, sdlba: LbaT, ranges: &[SourceRange], nr: u8,
                          fmt: CopyFmt) -> CmdResult
    {
        if usize::from(nr) >= ranges.len() {
            return Err(Errno::EINVAL);
        }
        if fmt != CopyFmt::Zero {
            return Ok(Status::INVALID_FIELD);
        }
        let used = &ranges[..=usize::from(nr)];
        for r in used {
            let status = self.validate_lbas(r.slba, r.naddr());
            if !status.is_success() {
                return Ok(status);
            }
        }
        let naddr = used.iter().map(SourceRange::naddr).sum();
        Ok(self.validate_lbas(sdlba, naddr))
    }

    fn validate_lbas(&self, slba: LbaT, naddr: u64) -> Status {
        match slba.checked_add(naddr) {
            Some(end) if end <= self.nlba => Status::SUCCESS,
            _ => Status::LBA_OUT_OF_RANGE
        }
    }
}

/// Descriptor formats of the simple-copy command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CopyFmt {
    /// Source Range Entries Copy Descriptor Format 0h
    #[default]
    Zero,
    /// Format 1h, which adds end-to-end protection fields
    One,
}

/// One source range of a simple-copy command.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SourceRange {
    /// First LBA of the range
    pub slba: LbaT,
    /// Number of LBAs in the range, minus one
    pub nlb: u16,
}

impl SourceRange {
    pub fn new(slba: LbaT, nlb: u16) -> Self {
        SourceRange{slba, nlb}
    }

    /// Number of LBAs covered by this range
    pub fn naddr(&self) -> u64 {
        u64::from(self.nlb) + 1
    }
}

/// Pretty-prints the first `nr + 1` entries of a source-range list.
pub struct SourceRangeTable<'a> {
    pub ranges: &'a [SourceRange],
    /// Zero-based number of ranges
    pub nr: u8,
}

impl fmt::Display for SourceRangeTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = &self.ranges[..self.ranges.len().min(usize::from(self.nr) + 1)];
        writeln!(f, "source_range:")?;
        writeln!(f, "  nranges: {}", self.ranges.len())?;
        writeln!(f, "  nr: {}", self.nr)?;
        write!(f, "  entries:")?;
        for (i, r) in used.iter().enumerate() {
            write!(f, "\n    - {{ idx: {i:3}, slba: {:#018x}, nlb: {} }}",
                   r.slba, r.nlb)?;
        }
        Ok(())
    }
}

/// A block device, as seen by the verifiers.
///
/// Every command is synchronous: when it returns, its effects are visible to
/// any subsequent command.  Block counts use the device convention of "number
/// of blocks minus one".
#[cfg_attr(test, automock)]
pub trait BlockDev {
    /// Return the device's geometry
    fn geometry(&self) -> Geometry;

    /// Allocate a buffer suitable for transfers to and from this device.
    ///
    /// The buffer is freed when dropped.
    fn buf_alloc(&self, nbytes: usize) -> Result<DmaBuf> {
        DmaBuf::alloc(nbytes)
    }

    /// Write `nlb + 1` blocks from `buf`, starting at `slba`.
    fn write(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &[u8])
        -> CmdResult;

    /// Read `nlb + 1` blocks into `buf`, starting at `slba`.
    fn read(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &mut [u8])
        -> CmdResult;

    /// Copy the first `nr + 1` source ranges, in order, to consecutive LBAs
    /// beginning at `sdlba`.
    ///
    /// The device must treat this as a single all-or-nothing operation.
    fn scopy(&mut self, nsid: Nsid, sdlba: LbaT, ranges: &[SourceRange],
             nr: u8, fmt: CopyFmt) -> CmdResult;
}

// LCOV_EXCL_STOP
