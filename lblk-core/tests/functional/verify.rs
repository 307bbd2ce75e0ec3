// vim: tw=80
//! End-to-end runs of the verifiers against file-backed devices

use lblk_core::{
    Error,
    LbaT,
    Nsid,
    Phase,
    buf::DmaBuf,
    device::*,
    file_dev::*,
    pattern::{Pattern, SENTINEL},
    plan::Bounds,
    verify::*,
};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

use super::backing_file;

/// Forwards to a `FileDev`, flipping one byte of the `nth` read.
struct BitRot {
    inner: FileDev,
    nth: usize,
    nreads: usize,
}

impl BlockDev for BitRot {
    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }

    fn buf_alloc(&self, nbytes: usize) -> lblk_core::Result<DmaBuf> {
        self.inner.buf_alloc(nbytes)
    }

    fn write(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &[u8])
        -> CmdResult
    {
        self.inner.write(nsid, slba, nlb, buf)
    }

    fn read(&mut self, nsid: Nsid, slba: LbaT, nlb: u16, buf: &mut [u8])
        -> CmdResult
    {
        let r = self.inner.read(nsid, slba, nlb, buf);
        if self.nreads == self.nth {
            buf[7] ^= 0x40;
        }
        self.nreads += 1;
        r
    }

    fn scopy(&mut self, nsid: Nsid, sdlba: LbaT, ranges: &[SourceRange],
             nr: u8, fmt: CopyFmt) -> CmdResult
    {
        self.inner.scopy(nsid, sdlba, ranges, nr, fmt)
    }
}

struct Harness {
    dev: FileDev,
    path: PathBuf,
    _tempdir: TempDir
}

/// 8 MB of 512-byte blocks
#[fixture]
fn harness() -> Harness {
    let (tempdir, path) = backing_file("test_verify", 1 << 23);
    let dev = FileDev::open(&path, FileDevOpts::default()).unwrap();
    Harness{dev, path, _tempdir: tempdir}
}

fn opts(slba: LbaT, elba: LbaT) -> Opts {
    Opts{bounds: Bounds::new(slba, elba), pattern: Pattern::Anum}
}

#[rstest]
#[case(Verifier::Io)]
#[case(Verifier::Scopy)]
fn pass(mut harness: Harness, #[case] verifier: Verifier) {
    verifier.run(&mut harness.dev, &opts(0, 4096)).unwrap();
}

#[rstest]
#[case(Verifier::Io)]
#[case(Verifier::Scopy)]
fn pass_offset_range(mut harness: Harness, #[case] verifier: Verifier) {
    verifier.run(&mut harness.dev, &opts(0x1000, 0x3000)).unwrap();
}

/// After a run, every block in range that the payload didn't touch still
/// holds the sentinel.
#[rstest]
fn sentinel_fill(mut harness: Harness) {
    io(&mut harness.dev, &opts(0, 4096)).unwrap();
    let contents = fs::read(&harness.path).unwrap();
    for (lba, blk) in contents.chunks(512).enumerate().take(4096) {
        if lba % 4 != 0 || lba >= 1024 {
            assert!(blk.iter().all(|&b| b == SENTINEL), "LBA {lba}");
        }
    }
    // Nothing past elba was touched
    assert!(contents[4096 * 512..].iter().all(|&b| b == 0));
}

/// The copy lands, contiguously, in the last 256 LBAs before elba
#[rstest]
fn scopy_destination(mut harness: Harness) {
    scopy(&mut harness.dev, &opts(0, 4096)).unwrap();
    let contents = fs::read(&harness.path).unwrap();
    let mut expected = vec![0u8; 131072];
    Pattern::Anum.fill(&mut expected);
    assert_eq!(&contents[(4096 - 256) * 512..4096 * 512], &expected[..]);
}

/// Corruption on the read path is detected, and the hexdump is logged
#[rstest]
#[case(Verifier::Io, 100)]
#[case(Verifier::Scopy, 0)]
#[test_log::test]
fn bit_rot(harness: Harness, #[case] verifier: Verifier, #[case] nth: usize) {
    let mut dev = BitRot{inner: harness.dev, nth, nreads: 0};
    let e = verifier.run(&mut dev, &opts(0, 4096)).unwrap_err();
    assert_eq!(e.phase(), Phase::Compare);
    assert_eq!(e.errno(), Errno::EIO);
    assert!(matches!(e, Error::VerificationMismatch{..}));
}

#[rstest]
#[test_log::test]
fn beyond_capacity(mut harness: Harness) {
    let e = io(&mut harness.dev, &opts(0, 1 << 15)).unwrap_err();
    assert_eq!(e.phase(), Phase::WriteFull);
    assert_eq!(e.errno(), Errno::EIO);
}

#[rstest]
fn invalid_range(mut harness: Harness) {
    let e = scopy(&mut harness.dev, &opts(100, 100)).unwrap_err();
    assert_eq!(e, Error::InvalidRange{slba: 100, elba: 100});
    assert_eq!(e.errno(), Errno::EINVAL);
    // Nothing was written
    let contents = fs::read(&harness.path).unwrap();
    assert!(contents.iter().all(|&b| b == 0));
}

/// 4 kB blocks with a small mdts
#[test]
fn large_blocks() {
    let (_tempdir, path) = backing_file("test_verify_large_blocks", 1 << 23);
    let fdo = FileDevOpts{lba_nbytes: 4096, mdts_nbytes: 65536,
                          ..Default::default()};
    let mut dev = FileDev::open(&path, fdo).unwrap();
    scopy(&mut dev, &opts(0, 2048)).unwrap();
    io(&mut dev, &opts(0, 2048)).unwrap();
}
