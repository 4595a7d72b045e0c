use anyhow::{anyhow, Error as AnyError};
use clap::{Parser, Subcommand};
use geo::geometry::Coord;
use std::{path::PathBuf, str::FromStr};

/// Estimate fog-edge advection speed along a transect drawn across two
/// BTD rasters.
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Earlier raster: raw big-endian f32 samples, row-major.
    pub before: PathBuf,

    /// Later raster, on the same grid as `before`.
    pub after: PathBuf,

    /// Raster width in pixels. Height is derived from file size.
    #[arg(short, long)]
    pub width: usize,

    /// Physical distance per pixel, e.g. km.
    #[arg(short, long, default_value_t = 2.0)]
    pub pixel_scale: f64,

    /// Time between the two rasters, e.g. hours.
    #[arg(short, long)]
    pub elapsed: f64,

    /// Transect start "x,y" in pixels.
    #[arg(long)]
    pub start: PixelXY,

    /// Transect end "x,y" in pixels.
    #[arg(long)]
    pub end: PixelXY,

    /// Sample spacing along the transect, in pixels.
    #[arg(short, long, default_value_t = 1.0)]
    pub spacing: f64,

    /// Correlation search half-width, in samples.
    #[arg(short, long, default_value_t = 10)]
    pub max_lag: usize,

    /// Correlation a confident estimate must exceed.
    #[arg(long, default_value_t = 0.5)]
    pub min_correlation: f64,

    /// Memory-map the rasters instead of reading them into memory.
    #[arg(long, default_value_t = false)]
    pub memmap: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Debug, Copy)]
pub struct PixelXY(pub Coord<f64>);

impl FromStr for PixelXY {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (x_str, y_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid x,y pair"))?;
        let x = f64::from_str(x_str.trim())?;
        let y = f64::from_str(y_str.trim())?;
        Ok(Self(Coord { x, y }))
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print both profiles to stdout.
    Csv,

    /// Print the full result as JSON.
    Json,

    /// Plot both profiles to terminal.
    Plot,

    /// Print speed and direction.
    Speed,

    /// Print the change in BTD along the transect.
    Diff,
}
