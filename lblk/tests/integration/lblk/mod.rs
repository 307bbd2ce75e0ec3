use assert_cmd::prelude::*;
use nix::errno::Errno;
use predicates::prelude::*;

use super::lblk;

mod io;
mod scopy;

#[test]
fn help() {
    lblk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scopy"));
}

#[test]
fn no_subcommand() {
    lblk()
        .assert()
        .failure()
        .code(2);
}

/// The exit status of a failed open is the errno
#[test]
fn enoent() {
    lblk()
        .args(["io", "/nonexistent/lblk.img"])
        .assert()
        .failure()
        .code(Errno::ENOENT as i32);
}
