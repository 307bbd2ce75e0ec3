// vim: tw=80
//! FileDev as seen from outside the device: through the file itself

use lblk_core::{
    Status,
    device::*,
    file_dev::*,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::{
    fs,
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};
use tempfile::TempDir;

use super::backing_file;

struct Harness {
    dev: FileDev,
    path: PathBuf,
    _tempdir: TempDir
}

#[fixture]
fn harness() -> Harness {
    let (tempdir, path) = backing_file("test_file_dev", 1 << 20);
    let dev = FileDev::open(&path, FileDevOpts::default()).unwrap();
    Harness{dev, path, _tempdir: tempdir}
}

// pet kcov
#[rstest]
fn debug(harness: Harness) {
    format!("{:?}", harness.dev);
}

#[rstest]
fn geometry(harness: Harness) {
    let geo = harness.dev.geometry();
    assert_eq!(geo.nlba, 2048);
    assert_eq!(geo.tbytes(), 1 << 20);
    assert_eq!(geo.mdts_naddr(), Some(256));
}

/// Data written through the device lands at `lba * lba_nbytes` in the file
#[rstest]
fn write_lands_in_file(mut harness: Harness) {
    let wbuf = vec![42u8; 1024];
    assert_eq!(harness.dev.write(1, 10, 1, &wbuf), Ok(Status::SUCCESS));
    let mut f = fs::File::open(&harness.path).unwrap();
    let mut rbuf = vec![0u8; 1024];
    f.seek(SeekFrom::Start(10 * 512)).unwrap();
    f.read_exact(&mut rbuf).unwrap();
    assert_eq!(rbuf, wbuf);
}

/// Data written to the file is read back through the device
#[rstest]
fn read_from_file(mut harness: Harness) {
    {
        let mut f = fs::OpenOptions::new()
            .write(true)
            .open(&harness.path)
            .unwrap();
        f.seek(SeekFrom::Start(2047 * 512)).unwrap();
        f.write_all(&[0xa5u8; 512]).unwrap();
    }
    let mut rbuf = vec![0u8; 512];
    assert_eq!(harness.dev.read(1, 2047, 0, &mut rbuf), Ok(Status::SUCCESS));
    assert_eq!(rbuf, vec![0xa5u8; 512]);
}

/// A full-sized copy of scattered blocks, as the scopy verifier issues it
#[rstest]
fn scopy_full(mut harness: Harness) {
    let ranges = (0..256u64).map(|i| {
        let blk = vec![(i % 256) as u8; 512];
        harness.dev.write(1, i * 4, 0, &blk).unwrap();
        SourceRange::new(i * 4, 0)
    }).collect::<Vec<_>>();
    assert_eq!(harness.dev.scopy(1, 2048 - 256, &ranges, 255, CopyFmt::Zero),
               Ok(Status::SUCCESS));
    let mut rbuf = vec![0u8; 131072];
    assert_eq!(harness.dev.read(1, 2048 - 256, 255, &mut rbuf),
               Ok(Status::SUCCESS));
    for (i, blk) in rbuf.chunks(512).enumerate() {
        assert!(blk.iter().all(|&b| b == i as u8), "block {i} differs");
    }
}

/// Commands past the end complete with an error status and leave the file
/// alone.
#[rstest]
fn beyond_capacity(mut harness: Harness) {
    let wbuf = vec![0u8; 512];
    assert_eq!(harness.dev.write(1, 2048, 0, &wbuf),
               Ok(Status::LBA_OUT_OF_RANGE));
    assert_eq!(fs::metadata(&harness.path).unwrap().len(), 1 << 20);
}
