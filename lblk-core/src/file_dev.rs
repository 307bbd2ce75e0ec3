// vim: tw=80
//! `BlockDev` backed by a regular file or a device node

use crate::{
    device::*,
    types::*,
};
use nix::errno::Errno;
use serde_derive::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{self, Seek, SeekFrom},
    os::unix::fs::{FileExt, OpenOptionsExt},
    path::{Path, PathBuf},
};
use tracing::debug;

fn to_errno(e: io::Error) -> Errno {
    e.raw_os_error().map(Errno::from_raw).map_or(Errno::EIO, failure_errno)
}

/// How to present a file as a block device
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileDevOpts {
    pub lba_nbytes: u32,
    pub mdts_nbytes: u32,
    pub nsid: Nsid,
    /// Open with `O_DIRECT`, bypassing the page cache
    pub direct: bool,
}

impl Default for FileDevOpts {
    fn default() -> Self {
        FileDevOpts {
            lba_nbytes: 512,
            mdts_nbytes: 131072,
            nsid: 1,
            direct: false
        }
    }
}

/// A file, addressed in fixed-size blocks.
///
/// Simple-copy is emulated by the host: the source ranges are gathered into a
/// bounce buffer and written to the destination in one go.
#[derive(Debug)]
pub struct FileDev {
    file: File,
    path: PathBuf,
    geo: Geometry,
}

impl FileDev {
    /// Open an existing file or device node.
    ///
    /// Its capacity is its length in whole blocks.
    pub fn open<P: AsRef<Path>>(path: P, opts: FileDevOpts) -> io::Result<Self>
    {
        if opts.lba_nbytes == 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        let pb = path.as_ref().to_path_buf();
        let mut oo = OpenOptions::new();
        oo.read(true).write(true);
        if opts.direct {
            oo.custom_flags(libc::O_DIRECT);
        }
        let mut file = oo.open(path)?;
        // Seeking works for device nodes, where metadata's len doesn't.
        let len = file.seek(SeekFrom::End(0))?;
        let geo = Geometry {
            nsid: opts.nsid,
            nlba: len / u64::from(opts.lba_nbytes),
            lba_nbytes: opts.lba_nbytes,
            mdts_nbytes: opts.mdts_nbytes,
        };
        debug!(path = %pb.display(), ?geo, "opened");
        Ok(FileDev{file, path: pb, geo})
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset(&self, lba: LbaT) -> u64 {
        lba * u64::from(self.geo.lba_nbytes)
    }

    fn transfer_nbytes(&self, nlb: u16) -> usize {
        (usize::from(nlb) + 1) * self.geo.lba_nbytes as usize
    }
}

impl BlockDev for FileDev {
    fn geometry(&self) -> Geometry {
        self.geo
    }

    fn write(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &[u8])
        -> CmdResult
    {
        if nsid != self.geo.nsid {
            return Ok(Status::INVALID_FIELD);
        }
        let status = self.geo.validate_io(slba, nlb, buf.len())?;
        if !status.is_success() {
            return Ok(status);
        }
        let nbytes = self.transfer_nbytes(nlb);
        self.file.write_all_at(&buf[..nbytes], self.offset(slba))
            .map_err(to_errno)?;
        Ok(Status::SUCCESS)
    }

    fn read(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &mut [u8])
        -> CmdResult
    {
        if nsid != self.geo.nsid {
            return Ok(Status::INVALID_FIELD);
        }
        let status = self.geo.validate_io(slba, nlb, buf.len())?;
        if !status.is_success() {
            return Ok(status);
        }
        let nbytes = self.transfer_nbytes(nlb);
        self.file.read_exact_at(&mut buf[..nbytes], self.offset(slba))
            .map_err(to_errno)?;
        Ok(Status::SUCCESS)
    }

    fn scopy(&mut self, nsid: Nsid, sdlba: LbaT, ranges: &[SourceRange],
             nr: u8, fmt: CopyFmt) -> CmdResult
    {
        if nsid != self.geo.nsid {
            return Ok(Status::INVALID_FIELD);
        }
        let status = self.geo.validate_scopy(sdlba, ranges, nr, fmt)?;
        if !status.is_success() {
            return Ok(status);
        }
        let used = &ranges[..=usize::from(nr)];
        let bs = self.geo.lba_nbytes as usize;
        let naddr: u64 = used.iter().map(SourceRange::naddr).sum();
        let mut bounce = self.buf_alloc(naddr as usize * bs)
            .map_err(|_| Errno::ENOMEM)?;
        let mut ofz = 0;
        for r in used {
            let len = r.naddr() as usize * bs;
            self.file.read_exact_at(&mut bounce[ofz..ofz + len],
                                    self.offset(r.slba))
                .map_err(to_errno)?;
            ofz += len;
        }
        self.file.write_all_at(&bounce[..], self.offset(sdlba))
            .map_err(to_errno)?;
        Ok(Status::SUCCESS)
    }
}

// LCOV_EXCL_STOP
