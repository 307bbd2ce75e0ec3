// vim: tw=80
//! RAM-backed block device with fault injection
//!
//! `MemDev` stores only the blocks that have been written; everything else
//! reads as zeros.  It is used to exercise the verifiers without hardware, and
//! can be told to misbehave in the ways that the verifiers must detect.

use crate::{
    device::*,
    types::*,
};
use nix::errno::Errno;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Command opcodes, as far as `MemDev` distinguishes them
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Opcode {
    Write,
    Read,
    Scopy,
}

/// A logged command
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cmd {
    pub opc: Opcode,
    /// Starting LBA.  For `Scopy`, the destination.
    pub slba: LbaT,
    /// Zero-based number of LBAs transferred
    pub nlb: u64,
}

/// Misbehavior that can be injected into a single command
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fault {
    /// Fail the command at the transport level
    Transport(Errno),
    /// Complete the command with this status and no side effects
    Status(Status),
    /// Invert one byte, at this offset, of the data returned by a read
    CorruptRead(usize),
    /// Report success for a write or copy, but don't store anything
    LostWrite,
}

#[derive(Debug)]
pub struct MemDev {
    geo: Geometry,
    blocks: BTreeMap<LbaT, Box<[u8]>>,
    /// Pending faults, keyed by opcode and that opcode's command index
    faults: HashMap<(Opcode, u64), Fault>,
    counts: HashMap<Opcode, u64>,
    log: Vec<Cmd>,
}

impl MemDev {
    /// Create a `MemDev` with the given geometry, initially all zeros.
    pub fn new(geo: Geometry) -> Self {
        assert!(geo.lba_nbytes > 0);
        MemDev {
            geo,
            blocks: BTreeMap::new(),
            faults: HashMap::new(),
            counts: HashMap::new(),
            log: Vec::new(),
        }
    }

    /// Every command issued so far, in order.  Faulted commands included.
    pub fn cmds(&self) -> &[Cmd] {
        &self.log[..]
    }

    /// Make the `nth` (zero-based) command with opcode `opc` misbehave.
    pub fn inject(&mut self, opc: Opcode, nth: u64, fault: Fault) {
        self.faults.insert((opc, nth), fault);
    }

    /// Contents of one block, bypassing the command interface.
    pub fn peek(&self, lba: LbaT) -> Vec<u8> {
        self.blocks.get(&lba)
            .map(|b| b.to_vec())
            .unwrap_or_else(|| vec![0u8; self.geo.lba_nbytes as usize])
    }

    /// Number of distinct blocks that have ever been written
    pub fn nblocks_written(&self) -> usize {
        self.blocks.len()
    }

    fn bs(&self) -> usize {
        self.geo.lba_nbytes as usize
    }

    /// Log the command and take whatever fault is pending for it.
    fn begin(&mut self, opc: Opcode, slba: LbaT, nlb: u64) -> Option<Fault> {
        self.log.push(Cmd{opc, slba, nlb});
        let count = self.counts.entry(opc).or_insert(0);
        let nth = *count;
        *count += 1;
        let fault = self.faults.remove(&(opc, nth));
        if let Some(f) = fault {
            debug!(?opc, nth, slba, ?f, "injecting fault");
        }
        fault
    }

    fn store(&mut self, slba: LbaT, data: &[u8]) {
        let bs = self.bs();
        for (i, blk) in data.chunks_exact(bs).enumerate() {
            self.blocks.insert(slba + i as u64, Box::from(blk));
        }
    }

    fn load(&self, slba: LbaT, data: &mut [u8]) {
        let bs = self.bs();
        for (i, blk) in data.chunks_exact_mut(bs).enumerate() {
            match self.blocks.get(&(slba + i as u64)) {
                Some(b) => blk.copy_from_slice(b),
                None => blk.fill(0)
            }
        }
    }
}

impl BlockDev for MemDev {
    fn geometry(&self) -> Geometry {
        self.geo
    }

    fn write(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &[u8])
        -> CmdResult
    {
        let fault = self.begin(Opcode::Write, slba, u64::from(nlb));
        if nsid != self.geo.nsid {
            return Ok(Status::INVALID_FIELD);
        }
        let status = self.geo.validate_io(slba, nlb, buf.len())?;
        if !status.is_success() {
            return Ok(status);
        }
        match fault {
            Some(Fault::Transport(e)) => Err(e),
            Some(Fault::Status(s)) => Ok(s),
            Some(Fault::LostWrite) => Ok(Status::SUCCESS),
            Some(Fault::CorruptRead(_)) | None => {
                let nbytes = (usize::from(nlb) + 1) * self.bs();
                self.store(slba, &buf[..nbytes]);
                Ok(Status::SUCCESS)
            }
        }
    }

    fn read(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &mut [u8])
        -> CmdResult
    {
        let fault = self.begin(Opcode::Read, slba, u64::from(nlb));
        if nsid != self.geo.nsid {
            return Ok(Status::INVALID_FIELD);
        }
        let status = self.geo.validate_io(slba, nlb, buf.len())?;
        if !status.is_success() {
            return Ok(status);
        }
        match fault {
            Some(Fault::Transport(e)) => Err(e),
            Some(Fault::Status(s)) => Ok(s),
            fault => {
                let nbytes = (usize::from(nlb) + 1) * self.bs();
                self.load(slba, &mut buf[..nbytes]);
                if let Some(Fault::CorruptRead(ofz)) = fault {
                    buf[ofz % nbytes] ^= 0xff;
                }
                Ok(Status::SUCCESS)
            }
        }
    }

    fn scopy(&mut self, nsid: Nsid, sdlba: LbaT, ranges: &[SourceRange],
             nr: u8, fmt: CopyFmt) -> CmdResult
    {
        let naddr: u64 = ranges.iter()
            .take(usize::from(nr) + 1)
            .map(SourceRange::naddr)
            .sum();
        let fault = self.begin(Opcode::Scopy, sdlba, naddr.saturating_sub(1));
        if nsid != self.geo.nsid {
            return Ok(Status::INVALID_FIELD);
        }
        let status = self.geo.validate_scopy(sdlba, ranges, nr, fmt)?;
        if !status.is_success() {
            return Ok(status);
        }
        match fault {
            Some(Fault::Transport(e)) => Err(e),
            Some(Fault::Status(s)) => Ok(s),
            Some(Fault::LostWrite) => Ok(Status::SUCCESS),
            Some(Fault::CorruptRead(_)) | None => {
                // Gather everything before storing anything, so overlapping
                // source and destination ranges behave like the real thing.
                let bs = self.bs();
                let mut data = vec![0u8; naddr as usize * bs];
                let mut ofz = 0;
                for r in &ranges[..=usize::from(nr)] {
                    let len = r.naddr() as usize * bs;
                    self.load(r.slba, &mut data[ofz..ofz + len]);
                    ofz += len;
                }
                self.store(sdlba, &data);
                Ok(Status::SUCCESS)
            }
        }
    }
}

// LCOV_EXCL_STOP
