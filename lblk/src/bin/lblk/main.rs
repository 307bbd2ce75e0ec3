// vim: tw=80
use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    process::exit,
};

use clap::{crate_version, Parser};
use lblk_core::{
    LbaT,
    Nsid,
    device::BlockDev,
    failure_errno,
    file_dev::{FileDev, FileDevOpts},
    parse_lba,
    pattern::Pattern,
    plan::Bounds,
    verify::{Opts, Verifier},
};
use nix::errno::Errno;
use tracing::error;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, Errno>;

/// How to address the device
#[derive(Parser, Clone, Debug)]
struct DevOpts {
    /// Size of one logical block in bytes
    #[clap(long, default_value_t = 512)]
    lba_nbytes: u32,
    /// Maximum bytes moved by a single command.  0 means unlimited.
    #[clap(long, default_value_t = 131072)]
    mdts_nbytes: u32,
    /// Namespace to address
    #[clap(long, default_value_t = 1)]
    nsid: Nsid,
    /// Bypass the page cache
    #[clap(long)]
    direct: bool,
}

impl DevOpts {
    fn open(&self, uri: &Path) -> Result<FileDev> {
        let fdo = FileDevOpts {
            lba_nbytes: self.lba_nbytes,
            mdts_nbytes: self.mdts_nbytes,
            nsid: self.nsid,
            direct: self.direct,
        };
        FileDev::open(uri, fdo).map_err(|e: io::Error| {
            error!(uri = %uri.display(), "Cannot open device: {e}");
            e.raw_os_error().map(Errno::from_raw)
                .map_or(Errno::EINVAL, failure_errno)
        })
    }
}

#[derive(Parser, Clone, Debug)]
struct Run {
    /// Path to a block device or image file
    uri:     PathBuf,
    /// First LBA of the range.  Decimal or 0x-prefixed hex.
    #[clap(long, value_parser = parse_lba)]
    slba:    Option<LbaT>,
    /// End of the range.  Ignored unless --slba is also given.
    #[clap(long, value_parser = parse_lba)]
    elba:    Option<LbaT>,
    /// Scattered payload: anum, zero, rand-k, or rand-t
    #[clap(long, default_value_t = Pattern::Anum)]
    pattern: Pattern,
    #[clap(flatten)]
    dev:     DevOpts,
}

impl Run {
    fn main(self, verifier: Verifier) -> Result<()> {
        let mut dev = self.dev.open(&self.uri)?;
        let opts = Opts {
            bounds: Bounds{slba: self.slba, elba: self.elba},
            pattern: self.pattern
        };
        verifier.run(&mut dev, &opts).map_err(|e| {
            error!(phase = %e.phase(), "{verifier:?}: FAIL: {e}");
            e.errno()
        })
    }
}

#[derive(Parser, Clone, Debug)]
/// Print the device geometry as YAML
struct Info {
    /// Path to a block device or image file
    uri: PathBuf,
    #[clap(flatten)]
    dev: DevOpts,
}

impl Info {
    fn main(self) -> Result<()> {
        let dev = self.dev.open(&self.uri)?;
        let geo = dev.geometry();
        let s = serde_yaml_ng::to_string(&geo).map_err(|e| {
            error!("Cannot serialize geometry: {e}");
            Errno::EIO
        })?;
        print!("{s}");
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
enum SubCommand {
    /// Write a scattered payload and read it back
    Io(Run),
    /// Write a scattered payload, simple-copy it, and read back the copy
    Scopy(Run),
    Info(Info),
}

#[derive(Parser, Clone, Debug)]
#[clap(version = crate_version!())]
/// Verify the data path of a logical-block device
struct Cli {
    #[clap(subcommand)]
    cmd: SubCommand,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
    let cli: Cli = Cli::parse();
    let r = match cli.cmd {
        SubCommand::Io(run) => run.main(Verifier::Io),
        SubCommand::Scopy(run) => run.main(Verifier::Scopy),
        SubCommand::Info(info) => info.main(),
    };
    if let Err(errno) = r {
        exit(exit_code(errno));
    }
}

/// Never report a failure as success
fn exit_code(errno: Errno) -> i32 {
    failure_errno(errno) as i32
}
