//! Creation-parameter policy for downstream materialization.
//!
//! Profiles are ephemeral: derived from a document every time, never stored
//! in one. The policy picks compression and predictors from the bit depth,
//! ground resolution from the extent, and overview factors from the raster
//! and block sizes.

use geo::{Distance, Haversine, Point};
use serde::Serialize;

use crate::components::dataset::{Dataset, VrtDocument};
use crate::components::warped::WarpedDataset;
use crate::components::DataType;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compression {
    Jpeg,
    Deflate,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "DEFLATE",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub tiled: bool,
    pub blocksize: [i64; 2],
    pub compression: Compression,
    /// 2 = horizontal differencing (integer depths), 3 = floating point.
    pub predictor: Option<u8>,
    pub zlevel: Option<u8>,
    /// Ground distance covered by one pixel, in meters for geographic
    /// systems and map units otherwise.
    pub resolution: f64,
    /// Power-of-two reduction factors, largest raster dimension down to
    /// the block size.
    pub overviews: Vec<u32>,
}

impl Profile {
    pub fn from_dataset(vrt: &Dataset) -> Result<Self> {
        Self::build(vrt, vrt.blocksize()?)
    }

    pub fn from_warped(vrt: &WarpedDataset) -> Result<Self> {
        Self::build(vrt, vrt.blocksize()?)
    }

    fn build(vrt: &impl VrtDocument, blocksize: [i64; 2]) -> Result<Self> {
        let depth = vrt.bitdepth()?;
        let (compression, predictor, zlevel) = match depth {
            DataType::Byte => (Compression::Jpeg, None, None),
            _ if depth.is_float() => (Compression::Deflate, Some(3), Some(9)),
            _ => (Compression::Deflate, Some(2), Some(9)),
        };
        Ok(Self {
            tiled: blocksize[0] == blocksize[1],
            blocksize,
            compression,
            predictor,
            zlevel,
            resolution: ground_resolution(vrt)?,
            overviews: overview_factors(vrt.xsize()?, vrt.ysize()?, blocksize[0].min(blocksize[1])),
        })
    }

    /// Render the `KEY=VALUE` creation parameters the rendering engine
    /// consumes alongside the document.
    pub fn creation_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        if self.tiled {
            options.push("TILED=TRUE".to_string());
        }
        options.push(format!("BLOCKXSIZE={}", self.blocksize[0]));
        options.push(format!("BLOCKYSIZE={}", self.blocksize[1]));
        options.push(format!("COMPRESS={}", self.compression));
        if let Some(predictor) = self.predictor {
            options.push(format!("PREDICTOR={predictor}"));
        }
        if let Some(zlevel) = self.zlevel {
            options.push(format!("ZLEVEL={zlevel}"));
        }
        options.push("NUM_THREADS=ALL_CPUS".to_string());
        options.push("BIGTIFF=IF_SAFER".to_string());
        options.push("COPY_SRC_OVERVIEWS=YES".to_string());
        options
    }
}

/// Ground distance per pixel. Geographic extents are measured along their
/// midlines with great-circle distance; projected systems already carry
/// map units per pixel.
fn ground_resolution(vrt: &impl VrtDocument) -> Result<f64> {
    let gt = vrt.geotransform()?;
    if !vrt.is_geographic() {
        return Ok(gt.xres().max(gt.yres()));
    }
    let extent = vrt.extent()?;
    let (xsize, ysize) = (vrt.xsize()?, vrt.ysize()?);
    let mid_y = (extent[2] + extent[3]) / 2.0;
    let mid_x = (extent[0] + extent[1]) / 2.0;
    let horizontal = Haversine.distance(
        Point::new(extent[0], mid_y),
        Point::new(extent[1], mid_y),
    ) / xsize as f64;
    let vertical = Haversine.distance(
        Point::new(mid_x, extent[2]),
        Point::new(mid_x, extent[3]),
    ) / ysize as f64;
    Ok(horizontal.max(vertical))
}

fn overview_factors(xsize: i64, ysize: i64, blocksize: i64) -> Vec<u32> {
    let mut factors = Vec::new();
    let mut factor = 2u32;
    while xsize.max(ysize) / factor as i64 >= blocksize {
        factors.push(factor);
        factor *= 2;
    }
    factors
}
