// vim: tw=80
//! Phases shared by the verifiers
//!
//! A [`Pipeline`] owns the plan and the working buffers of one run and borrows
//! the device for its duration.  Each phase either completes or returns the
//! error that ends the run.  Dropping the `Pipeline`, on any path, frees the
//! buffers.

use crate::{
    device::{BlockDev, CmdResult, CopyFmt, SourceRange},
    pattern::{self, Pattern, SENTINEL},
    plan::{Bounds, TestPlan, Workspace},
    types::*,
};
use tracing::{error, info};

/// Turn a command's outcome into a `Result`, logging any failure.
fn check(phase: Phase, cmd: &'static str, slba: LbaT, r: CmdResult)
    -> Result<()>
{
    match r {
        Ok(status) if status.is_success() => Ok(()),
        Ok(status) => {
            error!(%phase, cmd, slba = format_args!("{slba:#018x}"), %status,
                   "command failed");
            Err(Error::CompletionFailed{phase, slba, status})
        }
        Err(errno) => {
            error!(%phase, cmd, slba = format_args!("{slba:#018x}"), %errno,
                   "command failed");
            Err(Error::CommandFailed{phase, slba, errno})
        }
    }
}

#[derive(Debug)]
pub struct Pipeline<'a, D: BlockDev + ?Sized> {
    dev: &'a mut D,
    plan: TestPlan,
    ws: Workspace,
}

impl<'a, D: BlockDev + ?Sized> Pipeline<'a, D> {
    /// Plan the run and allocate its buffers.
    pub fn new(dev: &'a mut D, bounds: Bounds) -> Result<Self> {
        let geo = dev.geometry();
        let plan = TestPlan::new(&geo, bounds)?;
        let ws = plan.alloc(&*dev)?;
        plan.report();
        Ok(Pipeline{dev, plan, ws})
    }

    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.ws
    }

    /// Fill the write buffer with the sentinel byte.
    pub fn fill_sentinel(&mut self) {
        self.ws.wbuf.fill(SENTINEL);
    }

    /// Write the write buffer's contents over the entire range, one
    /// mdts-sized chunk at a time.
    pub fn write_full(&mut self) -> Result<()> {
        let p = self.plan;
        info!("Writing {:?} to LBA range [slba,elba]", SENTINEL as char);
        for (slba, nlb) in p.chunks() {
            let nbytes = (usize::from(nlb) + 1) * p.lba_nbytes as usize;
            let r = self.dev.write(p.nsid, slba, nlb, &self.ws.wbuf[..nbytes]);
            check(Phase::WriteFull, "write", slba, r)?;
        }
        Ok(())
    }

    /// Fill the write buffer with the scattered payload.
    pub fn fill_pattern(&mut self, pattern: Pattern) {
        pattern.fill(&mut self.ws.wbuf);
    }

    /// Write each block of the write buffer to its own LBA, `SCATTER_STRIDE`
    /// apart.
    ///
    /// If `ranges` is given, also record each block as a one-LBA source range
    /// at the index of its block.
    pub fn write_scatter(&mut self, mut ranges: Option<&mut [SourceRange]>)
        -> Result<()>
    {
        let p = self.plan;
        let bs = p.lba_nbytes as usize;
        info!("Writing payload scattered within LBA range [slba,elba]");
        for count in 0..p.mdts_naddr {
            let ofz = p.buf_offset(count);
            let slba = p.scatter_lba(count);
            if let Some(ranges) = ranges.as_deref_mut() {
                ranges[count as usize] = SourceRange::new(slba, 0);
            }
            let r = self.dev.write(p.nsid, slba, 0,
                                   &self.ws.wbuf[ofz..ofz + bs]);
            check(Phase::WriteScatter, "write", slba, r)?;
        }
        Ok(())
    }

    /// Simple-copy the first `nr + 1` of `ranges` to consecutive LBAs
    /// starting at `sdlba`.
    pub fn copy(&mut self, sdlba: LbaT, ranges: &[SourceRange], nr: u8)
        -> Result<()>
    {
        let nsid = self.plan.nsid;
        let r = self.dev.scopy(nsid, sdlba, ranges, nr, CopyFmt::Zero);
        check(Phase::Copy, "scopy", sdlba, r)
    }

    /// Poison the read buffer, then read back the blocks that
    /// [`write_scatter`](Self::write_scatter) wrote, each to the same offset
    /// it came from.
    pub fn read_scatter(&mut self) -> Result<()> {
        let p = self.plan;
        let bs = p.lba_nbytes as usize;
        info!("Read scattered payload within LBA range [slba,elba]");
        self.poison_rbuf();
        for count in 0..p.mdts_naddr {
            let ofz = p.buf_offset(count);
            let slba = p.scatter_lba(count);
            let r = self.dev.read(p.nsid, slba, 0,
                                  &mut self.ws.rbuf[ofz..ofz + bs]);
            check(Phase::Read, "read", slba, r)?;
        }
        Ok(())
    }

    /// Poison the read buffer, then read `nlb + 1` contiguous blocks into it.
    pub fn read_contig(&mut self, slba: LbaT, nlb: u16) -> Result<()> {
        let p = self.plan;
        let nbytes = (usize::from(nlb) + 1) * p.lba_nbytes as usize;
        info!(slba = format_args!("{slba:#018x}"), nlb, "read");
        self.poison_rbuf();
        let r = self.dev.read(p.nsid, slba, nlb, &mut self.ws.rbuf[..nbytes]);
        check(Phase::Read, "read", slba, r)
    }

    /// Fill the read buffer with the complement of the write buffer.  A read
    /// that doesn't deliver every byte can't pass, whatever the pattern.
    fn poison_rbuf(&mut self) {
        for (r, w) in self.ws.rbuf.iter_mut().zip(self.ws.wbuf.iter()) {
            *r = !*w;
        }
    }

    /// Compare the write buffer with the read buffer.
    pub fn compare(&self) -> Result<()> {
        info!("Comparing wbuf and rbuf");
        let wbuf = &self.ws.wbuf[..self.plan.buf_nbytes];
        let rbuf = &self.ws.rbuf[..self.plan.buf_nbytes];
        match pattern::diff(wbuf, rbuf) {
            None => Ok(()),
            Some(mismatch) => {
                let bs = self.plan.lba_nbytes as usize;
                let first_blk = mismatch.first() / bs;
                let last_blk = (mismatch.ranges[mismatch.ranges.len() - 1].end
                                - 1) / bs;
                error!(ndiff = mismatch.ndiff, first_blk, last_blk,
                       "wbuf and rbuf differ: {mismatch}");
                mismatch.dump(wbuf, rbuf, bs);
                Err(Error::VerificationMismatch{phase: Phase::Compare,
                                                mismatch})
            }
        }
    }
}

// LCOV_EXCL_STOP
