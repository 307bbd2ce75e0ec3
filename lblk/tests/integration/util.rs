use std::{fs, path::PathBuf, process::Command};

use assert_cmd::prelude::*;
use tempfile::{Builder, TempDir};

pub fn lblk() -> Command {
    Command::cargo_bin("lblk").unwrap()
}

/// A zero-filled image file to use as the device
pub type Harness = (PathBuf, TempDir);

pub fn image(prefix: &str, len: u64) -> Harness {
    let tempdir = Builder::new()
        .prefix(prefix)
        .tempdir()
        .unwrap();
    let filename = tempdir.path().join("lblk.img");
    let file = fs::File::create(&filename).unwrap();
    file.set_len(len).unwrap();
    (filename, tempdir)
}
