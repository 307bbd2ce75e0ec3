// vim: tw=80
//! Round-trip verifiers
//!
//! Both verifiers run the same state machine:
//!
//! ```text
//! PLAN -> FILL_SENTINEL -> WRITE_FULL -> FILL_PATTERN -> WRITE_SCATTER
//!      -> (COPY ->) READ -> COMPARE -> PASS
//! ```
//!
//! Any phase may instead fail the run.  The working buffers are freed either
//! way.

use crate::{
    device::{BlockDev, SourceRange, SourceRangeTable},
    pattern::Pattern,
    pipeline::Pipeline,
    plan::Bounds,
    types::*,
};
use tracing::{info, warn};

/// Options common to both verifiers
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Opts {
    pub bounds: Bounds,
    /// Content of the scattered payload
    pub pattern: Pattern,
}

/// The available verifiers
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verifier {
    /// Sequential round trip: scatter-write, then read back
    Io,
    /// Copy-offload round trip: scatter-write, simple-copy, then read back
    Scopy,
}

impl Verifier {
    pub fn run<D: BlockDev + ?Sized>(self, dev: &mut D, opts: &Opts)
        -> Result<()>
    {
        match self {
            Verifier::Io => io(dev, opts),
            Verifier::Scopy => scopy(dev, opts),
        }
    }
}

/// Verify that a scattered payload reads back exactly as it was written.
pub fn io<D: BlockDev + ?Sized>(dev: &mut D, opts: &Opts) -> Result<()> {
    let mut pipeline = Pipeline::new(dev, opts.bounds)?;
    pipeline.fill_sentinel();
    pipeline.write_full()?;
    pipeline.fill_pattern(opts.pattern);
    pipeline.write_scatter(None)?;
    pipeline.read_scatter()?;
    pipeline.compare()?;
    info!("io: PASS");
    Ok(())
}

/// Verify that simple-copy reproduces a scattered payload, contiguously, at
/// the tail of the range.
pub fn scopy<D: BlockDev + ?Sized>(dev: &mut D, opts: &Opts) -> Result<()> {
    let geo = dev.geometry();
    info!(?geo, "device geometry");
    let mut pipeline = Pipeline::new(dev, opts.bounds)?;
    let plan = *pipeline.plan();

    let mut ranges = vec![SourceRange::default(); plan.mdts_naddr as usize];
    let sdlba = plan.sdlba();
    // Zero-based number of ranges
    let nr = (plan.mdts_naddr - 1) as u8;

    pipeline.fill_sentinel();
    pipeline.write_full()?;
    pipeline.fill_pattern(opts.pattern);
    pipeline.write_scatter(Some(&mut ranges[..]))?;

    let dest = sdlba..sdlba.saturating_add(plan.mdts_naddr);
    if ranges.iter().any(|r| dest.contains(&r.slba)) {
        warn!(sdlba, "Copy destination overlaps the source ranges");
    }
    info!(sdlba = format_args!("{sdlba:#018x}"), "scopy sranges to sdlba");
    info!("\n{}", SourceRangeTable{ranges: &ranges[..], nr});
    pipeline.copy(sdlba, &ranges[..], nr)?;

    info!(sdlba = format_args!("{sdlba:#018x}"), "read sdlba");
    pipeline.read_contig(sdlba, u16::from(nr))?;
    pipeline.compare()?;
    info!("scopy: PASS");
    Ok(())
}

// LCOV_EXCL_STOP
