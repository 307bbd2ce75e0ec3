// vim: tw=80
//! Logical-block data-path verification
//!
//! Proves that bytes written to a range of logical blocks are read back
//! unchanged, using sequential writes, scattered writes and reads, and the
//! device's simple-copy command.

// I suppose I should probably fix this some day, but I just don't like the look
// of e.g. "Lba" as opposed to "LBA".
#![allow(clippy::upper_case_acronyms)]

pub mod buf;
pub mod device;
pub mod file_dev;
pub mod mem_dev;
pub mod pattern;
pub mod pipeline;
pub mod plan;
pub mod types;
pub mod util;
pub mod verify;

pub use crate::types::*;
pub use crate::util::*;
