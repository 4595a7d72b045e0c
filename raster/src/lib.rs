//! Single-band raster buffers.
//!
//! A [Raster] is an immutable grid of `f32` samples (for example a
//! brightness-temperature difference in Kelvin) plus the
//! [GeoTransform] needed to turn pixel distances into physical ones.
//!
//! Samples are stored row-major with row 0 at the top of the image.
//! Non-finite samples mark missing data.
//!
//! # On-disk layout
//!
//! [Raster::load] and [Raster::memmap] read headerless big-endian
//! `f32` grids. Width is supplied by the caller and height is derived
//! from the file length.

mod error;

pub use crate::error::RasterError;
use byteorder::{BigEndian as BE, ByteOrder, ReadBytesExt};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path, sync::OnceLock};

/// Base floating point type used for all coordinates and calculations.
pub type C = f64;

/// Maps pixel space onto a physical plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// World coordinates of the center of pixel `(0, 0)`.
    pub origin: Coord<C>,

    /// Physical distance per pixel (e.g. km/px).
    pub pixel_scale: C,

    /// Clockwise rotation of image-up relative to world-north, in
    /// radians.
    pub rotation: C,
}

impl GeoTransform {
    /// Returns an unrotated transform anchored at the world origin.
    pub fn with_scale(pixel_scale: C) -> Self {
        Self {
            origin: Coord { x: 0.0, y: 0.0 },
            pixel_scale,
            rotation: 0.0,
        }
    }

    /// Returns the world-frame vector for a pixel-space delta.
    ///
    /// Pixel `y` grows downward, world `y` grows northward.
    pub fn delta_to_world(&self, delta: Coord<C>) -> Coord<C> {
        let (sin, cos) = self.rotation.sin_cos();
        let right = delta.x;
        let up = -delta.y;
        Coord {
            x: (up * sin + right * cos) * self.pixel_scale,
            y: (up * cos - right * sin) * self.pixel_scale,
        }
    }

    /// Returns world coordinates for a pixel location.
    pub fn to_world(&self, pixel: Coord<C>) -> Coord<C> {
        self.origin + self.delta_to_world(pixel)
    }

    /// Returns the compass heading, in degrees clockwise from north,
    /// of a pixel-space delta.
    pub fn heading(&self, delta: Coord<C>) -> C {
        let Coord { x: east, y: north } = self.delta_to_world(delta);
        east.atan2(north).to_degrees().rem_euclid(360.0)
    }
}

pub struct Raster {
    /// Number of (columns, rows).
    dimensions: (usize, usize),

    /// Pixel georeferencing.
    geo: GeoTransform,

    /// Lowest and highest finite samples, computed on first use.
    extremes: OnceLock<Option<(f32, f32)>>,

    /// Intensity samples.
    samples: SampleStore,
}

enum SampleStore {
    InMem(Box<[f32]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get_unchecked(&self, index: usize) -> f32 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<f32>();
                BE::read_f32(&raw[start..start + size_of::<f32>()])
            }
        }
    }

    fn extremes(&self, len: usize) -> Option<(f32, f32)> {
        (0..len)
            .map(|index| self.get_unchecked(index))
            .filter(|sample| sample.is_finite())
            .fold(None, |acc, sample| match acc {
                None => Some((sample, sample)),
                Some((lo, hi)) => Some((lo.min(sample), hi.max(sample))),
            })
    }
}

// Construction rejects empty rasters.
#[allow(clippy::len_without_is_empty)]
impl Raster {
    /// Returns a raster wrapping already decoded samples.
    pub fn from_vec(
        width: usize,
        height: usize,
        samples: Vec<f32>,
        geo: GeoTransform,
    ) -> Result<Self, RasterError> {
        check_geometry(width, height, &geo)?;
        if samples.len() != width * height {
            return Err(RasterError::SampleCount {
                expected: width * height,
                actual: samples.len(),
            });
        }
        Ok(Self {
            dimensions: (width, height),
            geo,
            extremes: OnceLock::new(),
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a raster whose sample at `(x, y)` is `f(x, y)`.
    pub fn from_fn<F>(
        width: usize,
        height: usize,
        geo: GeoTransform,
        f: F,
    ) -> Result<Self, RasterError>
    where
        F: Fn(usize, usize) -> f32,
    {
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self::from_vec(width, height, samples, geo)
    }

    /// Returns a Raster read into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P, width: usize, geo: GeoTransform) -> Result<Self, RasterError> {
        let (width, height) = extract_dimensions(&path, width)?;
        check_geometry(width, height, &geo)?;
        let mut file = BufReader::new(File::open(path)?);

        let samples = {
            let mut sample_store = Vec::with_capacity(width * height);
            for _ in 0..(width * height) {
                sample_store.push(file.read_f32::<BE>()?);
            }
            SampleStore::InMem(sample_store.into_boxed_slice())
        };

        Ok(Self {
            dimensions: (width, height),
            geo,
            extremes: OnceLock::new(),
            samples,
        })
    }

    /// Returns a Raster using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(
        path: P,
        width: usize,
        geo: GeoTransform,
    ) -> Result<Self, RasterError> {
        let (width, height) = extract_dimensions(&path, width)?;
        check_geometry(width, height, &geo)?;

        let samples = {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            SampleStore::MemMap(mmap)
        };

        Ok(Self {
            dimensions: (width, height),
            geo,
            extremes: OnceLock::new(),
            samples,
        })
    }

    pub fn width(&self) -> usize {
        self.dimensions.0
    }

    pub fn height(&self) -> usize {
        self.dimensions.1
    }

    /// Returns (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    pub fn geo(&self) -> &GeoTransform {
        &self.geo
    }

    /// Physical distance per pixel.
    pub fn pixel_scale(&self) -> C {
        self.geo.pixel_scale
    }

    /// Returns the number of samples in this raster.
    pub fn len(&self) -> usize {
        let (x, y) = self.dimensions;
        x * y
    }

    /// Returns the sample at pixel `(x, y)`, if it lies within the
    /// raster.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.dimensions.0 && y < self.dimensions.1 {
            Some(self.get_unchecked(x, y))
        } else {
            None
        }
    }

    /// Returns the lowest and highest finite samples, or `None` if
    /// every sample is missing.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        *self
            .extremes
            .get_or_init(|| self.samples.extremes(self.len()))
    }

    /// Returns true if `other` shares this raster's grid and pixel
    /// scale.
    pub fn is_co_registered(&self, other: &Raster) -> bool {
        self.dimensions == other.dimensions
            && (self.geo.pixel_scale - other.geo.pixel_scale).abs()
                <= C::EPSILON * self.geo.pixel_scale.max(other.geo.pixel_scale)
    }

    /// Returns `self - other`, sample by sample, keeping this raster's
    /// georeferencing.
    ///
    /// Used to derive a BTD from two bands, or the change in BTD
    /// between two acquisitions.
    pub fn difference(&self, other: &Raster) -> Result<Raster, RasterError> {
        if self.dimensions != other.dimensions {
            let ((w0, h0), (w1, h1)) = (self.dimensions, other.dimensions);
            return Err(RasterError::Dimensions(w0, h0, w1, h1));
        }
        let samples = (0..self.len())
            .map(|idx| self.samples.get_unchecked(idx) - other.samples.get_unchecked(idx))
            .collect();
        Raster::from_vec(self.dimensions.0, self.dimensions.1, samples, self.geo)
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("dimensions", &self.dimensions)
            .field("geo", &self.geo)
            .finish_non_exhaustive()
    }
}

/// Private API
impl Raster {
    /// Panics if `(x, y)` lies outside of the raster.
    fn get_unchecked(&self, x: usize, y: usize) -> f32 {
        self.samples.get_unchecked(self.xy_to_linear_index((x, y)))
    }

    fn xy_to_linear_index(&self, (x, y): (usize, usize)) -> usize {
        self.dimensions.0 * y + x
    }
}

fn check_geometry(width: usize, height: usize, geo: &GeoTransform) -> Result<(), RasterError> {
    if width == 0 || height == 0 {
        return Err(RasterError::Empty);
    }
    if !(geo.pixel_scale.is_finite() && geo.pixel_scale > 0.0) {
        return Err(RasterError::PixelScale(geo.pixel_scale));
    }
    Ok(())
}

fn extract_dimensions<P: AsRef<Path>>(path: P, width: usize) -> Result<(usize, usize), RasterError> {
    let len = path.as_ref().metadata().map(|m| m.len())?;
    let row_len = (width * size_of::<f32>()) as u64;
    if row_len == 0 || len == 0 || len % row_len != 0 {
        return Err(RasterError::Len(len, width, path.as_ref().to_owned()));
    }
    #[allow(clippy::cast_possible_truncation)]
    let height = (len / row_len) as usize;
    Ok((width, height))
}
