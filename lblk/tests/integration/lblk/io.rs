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
        .args(["io", "--slba", "0", "--elba", "4096"])
        .arg(&filename)
        .assert()
        .success()
        .stderr(predicate::str::contains("io: PASS"));
}

#[rstest]
fn pass_hex(harness: Harness) {
    let (filename, _tempdir) = harness;
    lblk()
        .args(["io", "--slba", "0x100", "--elba", "0x2000", "--pattern",
               "rand-k"])
        .arg(&filename)
        .assert()
        .success();
}

#[rstest]
fn pass_large_blocks(harness: Harness) {
    let (filename, _tempdir) = harness;
    lblk()
        .args(["io", "--slba", "0", "--elba", "1024", "--lba-nbytes", "4096",
               "--mdts-nbytes", "0"])
        .arg(&filename)
        .assert()
        .success();
}

/// An empty or inverted range is EINVAL, and touches nothing
#[rstest]
#[case("100", "100")]
#[case("100", "99")]
fn invalid_range(harness: Harness, #[case] slba: &str, #[case] elba: &str) {
    let (filename, _tempdir) = harness;
    lblk()
        .args(["io", "--slba", slba, "--elba", elba])
        .arg(&filename)
        .assert()
        .failure()
        .code(Errno::EINVAL as i32)
        .stderr(predicate::str::contains("Invalid range"));
    let contents = std::fs::read(&filename).unwrap();
    assert!(contents.iter().all(|&b| b == 0));
}

/// The default range is larger than this image, so the full-range write
/// fails with a completion error.
#[rstest]
fn default_range_beyond_capacity(harness: Harness) {
    let (filename, _tempdir) = harness;
    lblk()
        .arg("io")
        .arg(&filename)
        .assert()
        .failure()
        .code(Errno::EIO as i32)
        .stderr(predicate::str::contains("write-full"));
}
