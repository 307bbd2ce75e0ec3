// vim: tw=80
//! Common type definitions used throughout lblk

use crate::pattern::Mismatch;
use nix::errno::Errno;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use std::fmt::{self, Display, Formatter};

/// Indexes an LBA.  The size of an LBA is a property of the device.
pub type LbaT = u64;

/// Namespace identifier
pub type Nsid = u32;

/// Device completion status, as reported in the status field of a completion
/// queue entry: Status Code Type in the high byte, Status Code in the low byte.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq,
         Serialize)]
pub struct Status(pub u16);

impl Status {
    pub const SUCCESS: Status = Status(0x0000);
    pub const INVALID_OPCODE: Status = Status(0x0001);
    pub const INVALID_FIELD: Status = Status(0x0002);
    pub const DATA_TRANSFER_ERROR: Status = Status(0x0004);
    pub const INTERNAL: Status = Status(0x0006);
    pub const LBA_OUT_OF_RANGE: Status = Status(0x0080);
    pub const UNRECOVERED_READ_ERROR: Status = Status(0x0281);

    /// Status Code Type
    pub fn sct(self) -> u8 {
        (self.0 >> 8) as u8 & 0x7
    }

    /// Status Code
    pub fn sc(self) -> u8 {
        self.0 as u8
    }

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    fn name(self) -> &'static str {
        match self {
            Status::SUCCESS => "Successful Completion",
            Status::INVALID_OPCODE => "Invalid Command Opcode",
            Status::INVALID_FIELD => "Invalid Field in Command",
            Status::DATA_TRANSFER_ERROR => "Data Transfer Error",
            Status::INTERNAL => "Internal Error",
            Status::LBA_OUT_OF_RANGE => "LBA Out of Range",
            Status::UNRECOVERED_READ_ERROR => "Unrecovered Read Error",
            _ => "Unknown"
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{sct: {:#x}, sc: {:#04x}}} ({})", self.sct(), self.sc(),
               self.name())
    }
}

/// Where in the verification pipeline something happened.
///
/// The variants are listed in pipeline order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Phase {
    Plan,
    FillSentinel,
    WriteFull,
    FillPattern,
    WriteScatter,
    Copy,
    Read,
    Compare,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match self {
            Phase::Plan => "plan",
            Phase::FillSentinel => "fill-sentinel",
            Phase::WriteFull => "write-full",
            Phase::FillPattern => "fill-pattern",
            Phase::WriteScatter => "write-scatter",
            Phase::Copy => "copy",
            Phase::Read => "read",
            Phase::Compare => "compare",
        };
        s.fmt(f)
    }
}

/// lblk's error type.
///
/// Every variant aborts the current run.  None of them are retried.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("Invalid range: [slba: {slba:#018x}, elba: {elba:#018x}]")]
    InvalidRange { slba: LbaT, elba: LbaT },

    #[error("Invalid geometry: {{lba_nbytes: {lba_nbytes}, mdts_nbytes: {mdts_nbytes}}}")]
    InvalidGeometry { lba_nbytes: u32, mdts_nbytes: u32 },

    #[error("Cannot allocate a {nbytes} byte buffer")]
    AllocationFailed { nbytes: usize },

    /// The command never reached the device, or the transport failed it.
    #[error("{phase}: command failed {{slba: {slba:#018x}, err: {errno}}}")]
    CommandFailed { phase: Phase, slba: LbaT, errno: Errno },

    /// The device completed the command with a non-success status.
    #[error("{phase}: command failed {{slba: {slba:#018x}, status: {status}}}")]
    CompletionFailed { phase: Phase, slba: LbaT, status: Status },

    #[error("{phase}: {mismatch}")]
    VerificationMismatch { phase: Phase, mismatch: Mismatch },
}

impl Error {
    /// The errno best describing this error.
    ///
    /// It becomes the process's exit status.
    pub fn errno(&self) -> Errno {
        match self {
            Error::InvalidRange{..} => Errno::EINVAL,
            Error::InvalidGeometry{..} => Errno::EINVAL,
            Error::AllocationFailed{..} => Errno::ENOMEM,
            Error::CommandFailed{errno, ..} => failure_errno(*errno),
            Error::CompletionFailed{..} => Errno::EIO,
            Error::VerificationMismatch{..} => Errno::EIO,
        }
    }

    /// The phase that failed
    pub fn phase(&self) -> Phase {
        match self {
            Error::InvalidRange{..} |
            Error::InvalidGeometry{..} |
            Error::AllocationFailed{..} => Phase::Plan,
            Error::CommandFailed{phase, ..} |
            Error::CompletionFailed{phase, ..} |
            Error::VerificationMismatch{phase, ..} => *phase
        }
    }
}

impl From<Error> for i32 {
    fn from(e: Error) -> Self {
        e.errno() as i32
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// An errno fit to report a failure with.  Unrecognized values, which `nix`
/// decodes as `UnknownErrno` (zero), become `EIO`.
pub fn failure_errno(errno: Errno) -> Errno {
    match errno {
        Errno::UnknownErrno => Errno::EIO,
        e => e
    }
}

// LCOV_EXCL_STOP
