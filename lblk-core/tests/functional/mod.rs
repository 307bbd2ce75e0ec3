// vim: tw=80
use std::{fs, path::PathBuf};

use tempfile::{Builder, TempDir};

/// Helper to create a zero-filled backing file of `nbytes`
fn backing_file(prefix: &str, nbytes: u64) -> (TempDir, PathBuf) {
    let tempdir = Builder::new()
        .prefix(prefix)
        .tempdir()
        .unwrap();
    let path = tempdir.path().join("lblk.img");
    let file = fs::File::create(&path).unwrap();
    file.set_len(nbytes).unwrap();
    (tempdir, path)
}

mod file_dev;
mod verify;
