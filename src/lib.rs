//! Build and transform virtual-raster metadata documents.
//!
//! A document describes how pixel windows of source files map into a
//! virtual output raster; external engines materialize it into imagery.
//! This crate owns the in-memory model and the two transforms over it:
//! [`translate`] (subsetting and resampling within one projection) and
//! [`warp`] (reprojection, cutline clipping, alpha synthesis). Pixel data
//! is never read or written here.
//!
//! Every transform works on its own deep copy: callers keep their input
//! document untouched whether the call succeeds or fails.

mod components;
mod engines;
pub mod errors;
pub mod profiles;
pub mod srs;

pub use components::dataset::{Dataset, SourceKind, VrtDocument};
pub use components::geotransform::GeoTransform;
pub use components::parser;
pub use components::warped::WarpedDataset;
pub use components::{DataType, Document};
pub use engines::translate::{translate, TranslateOptions};
pub use engines::warp::{warp, warp_dataset, Clipper, WarpOptions, DEFAULT_RESAMPLE};
pub use errors::{Result, VrtError};
