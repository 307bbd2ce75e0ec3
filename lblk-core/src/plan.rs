// vim: tw=80
//! Derive test parameters from device geometry

use crate::{
    buf::DmaBuf,
    device::{BlockDev, Geometry},
    types::*,
    util::div_roundup,
};
use tracing::{info, warn};

/// No single command ever transfers more than this many LBAs, regardless of
/// the device's mdts.
pub const MAX_TRANSFER_BLOCKS: u64 = 256;

/// Distance in LBAs between consecutive blocks of the scattered payload.
pub const SCATTER_STRIDE: u64 = 4;

/// Size in bytes of the default LBA range, about 256 MB.
pub const DEFAULT_RANGE_NBYTES: u64 = 1 << 28;

/// User-supplied bounds for the LBA range.
///
/// They are only honored if both are given.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Bounds {
    pub slba: Option<LbaT>,
    pub elba: Option<LbaT>,
}

impl Bounds {
    pub fn new(slba: LbaT, elba: LbaT) -> Self {
        Bounds{slba: Some(slba), elba: Some(elba)}
    }

    fn resolve(self, lba_nbytes: u32) -> (LbaT, LbaT) {
        match (self.slba, self.elba) {
            (Some(slba), Some(elba)) => (slba, elba),
            (None, None) => Self::default_range(lba_nbytes),
            (slba, elba) => {
                warn!(?slba, ?elba,
                    "Both slba and elba are needed; using the default range");
                Self::default_range(lba_nbytes)
            }
        }
    }

    // NB: the end of the default range is not decremented, so it names the
    // LBA just past 256 MB.  The full-range write stops short of it.
    fn default_range(lba_nbytes: u32) -> (LbaT, LbaT) {
        (0, DEFAULT_RANGE_NBYTES / u64::from(lba_nbytes))
    }
}

/// Parameters for one verification run.  Immutable once computed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TestPlan {
    pub nsid: Nsid,
    /// First LBA of the range
    pub slba: LbaT,
    /// Last LBA of the range
    pub elba: LbaT,
    /// Number of LBAs transferred by the largest command
    pub mdts_naddr: u64,
    pub lba_nbytes: u32,
    /// Size of each working buffer
    pub buf_nbytes: usize,
}

impl TestPlan {
    /// Compute a plan from the device's geometry and the user's bounds.
    ///
    /// No I/O is performed and nothing is allocated.  Bounds whose LBA count
    /// or scattered payload can't be represented are an `InvalidRange`.
    pub fn new(geo: &Geometry, bounds: Bounds) -> Result<Self> {
        let lba_nbytes = geo.lba_nbytes;
        let bad_geo = Error::InvalidGeometry{
            lba_nbytes, mdts_nbytes: geo.mdts_nbytes
        };
        if lba_nbytes == 0 {
            return Err(bad_geo);
        }
        let mdts_naddr = match geo.mdts_nbytes {
            0 => MAX_TRANSFER_BLOCKS,
            mdts_nbytes => {
                let naddr = u64::from(mdts_nbytes / lba_nbytes);
                if naddr == 0 {
                    return Err(bad_geo);
                }
                naddr.min(MAX_TRANSFER_BLOCKS)
            }
        };
        let buf_nbytes = (mdts_naddr * u64::from(lba_nbytes)) as usize;

        let (slba, elba) = bounds.resolve(lba_nbytes);
        if elba <= slba {
            return Err(Error::InvalidRange{slba, elba});
        }

        // Both the LBA count and the last scattered LBA must be addressable
        let last_scatter = (mdts_naddr - 1).checked_mul(SCATTER_STRIDE)
            .and_then(|ofs| slba.checked_add(ofs));
        let Some(last_scatter) = last_scatter else {
            return Err(Error::InvalidRange{slba, elba});
        };
        if (elba - slba).checked_add(1).is_none() {
            return Err(Error::InvalidRange{slba, elba});
        }

        let plan = TestPlan{nsid: geo.nsid, slba, elba, mdts_naddr, lba_nbytes,
                            buf_nbytes};
        if last_scatter >= elba {
            warn!(slba, elba, scatter_naddr = mdts_naddr * SCATTER_STRIDE,
                  "Scattered payload extends beyond the range");
        }
        Ok(plan)
    }

    /// Allocate the write and read buffers.
    ///
    /// If the second allocation fails, the first buffer is released before
    /// the error is returned.
    pub fn alloc<D: BlockDev + ?Sized>(&self, dev: &D) -> Result<Workspace> {
        let wbuf = dev.buf_alloc(self.buf_nbytes)?;
        let rbuf = dev.buf_alloc(self.buf_nbytes)?;
        Ok(Workspace{wbuf, rbuf})
    }

    /// Log a summary of the plan.
    pub fn report(&self) {
        info!(nsid = format_args!("{:#x}", self.nsid),
              slba = format_args!("{:#018x}", self.slba),
              elba = format_args!("{:#018x}", self.elba),
              naddr = self.naddr(),
              buf_nbytes = self.buf_nbytes,
              mdts_naddr = self.mdts_naddr,
              nchunks = div_roundup(self.elba - self.slba, self.mdts_naddr),
              "test plan");
    }

    /// The chunks of the full-range sequential write, as `(slba, nlb)` pairs.
    ///
    /// `nlb` is zero-based.  The chunks cover `[slba, elba)`.
    pub fn chunks(&self) -> impl Iterator<Item=(LbaT, u16)> {
        let elba = self.elba;
        let mdts_naddr = self.mdts_naddr;
        (self.slba..self.elba)
            .step_by(mdts_naddr as usize)
            .map(move |lba| (lba, ((elba - lba).min(mdts_naddr) - 1) as u16))
    }

    /// Number of LBAs in the range, counting both ends
    pub fn naddr(&self) -> u64 {
        self.elba - self.slba + 1
    }

    /// Destination of the simple-copy: the tail of the range.
    pub fn sdlba(&self) -> LbaT {
        self.elba.saturating_sub(self.mdts_naddr)
    }

    /// The LBA that receives block `count` of the scattered payload
    pub fn scatter_lba(&self, count: u64) -> LbaT {
        self.slba + count * SCATTER_STRIDE
    }

    /// Offset into the working buffers of block `count`
    pub fn buf_offset(&self, count: u64) -> usize {
        count as usize * self.lba_nbytes as usize
    }
}

/// The two working buffers of a run.  Both are freed on drop.
#[derive(Debug)]
pub struct Workspace {
    pub wbuf: DmaBuf,
    pub rbuf: DmaBuf,
}

// LCOV_EXCL_STOP
