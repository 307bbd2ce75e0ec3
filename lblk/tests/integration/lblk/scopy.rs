use std::fs;

use assert_cmd::prelude::*;
use nix::errno::Errno;
use predicates::prelude::*;
use rstest::{fixture, rstest};

use super::super::{image, lblk, Harness};

/// An 8 MB image
#[fixture]
fn harness() -> Harness {
    image(concat!(module_path!(), "."), 1 << 23)
}

#[rstest]
fn pass(harness: Harness) {
    let (filename, _tempdir) = harness;
    lblk()
        .args(["scopy", "--slba", "0", "--elba", "4096"])
        .arg(&filename)
        .assert()
        .success()
        .stderr(predicate::str::contains("scopy: PASS"))
        .stderr(predicate::str::contains("nr: 255"));
    // The copy landed at the tail of the range
    let contents = fs::read(&filename).unwrap();
    let sdlba = 4096 - 256;
    let copied = &contents[sdlba * 512..4096 * 512];
    for (i, b) in copied.iter().enumerate() {
        assert_eq!(*b, b'A' + (i % 26) as u8);
    }
}

/// A small mdts means fewer, zero-based, source ranges
#[rstest]
fn small_mdts(harness: Harness) {
    let (filename, _tempdir) = harness;
    lblk()
        .args(["scopy", "--slba", "0", "--elba", "64", "--mdts-nbytes",
               "2048"])
        .arg(&filename)
        .assert()
        .success()
        .stderr(predicate::str::contains("nr: 3"));
}

#[rstest]
fn invalid_geometry(harness: Harness) {
    let (filename, _tempdir) = harness;
    lblk()
        .args(["scopy", "--slba", "0", "--elba", "64", "--mdts-nbytes",
               "256"])
        .arg(&filename)
        .assert()
        .failure()
        .code(Errno::EINVAL as i32);
}
