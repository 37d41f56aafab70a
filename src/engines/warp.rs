//! Reprojection, cutline clipping and alpha-band synthesis.

use std::path::PathBuf;

use geo::{BoundingRect, Coord, MapCoords, Polygon};
use log::debug;
use wkt::ToWkt;

use crate::components::dataset::{Dataset, VrtDocument};
use crate::components::geotransform::GeoTransform;
use crate::components::warped::WarpedDataset;
use crate::errors::{Result, VrtError};
use crate::srs::SrsService;

pub const DEFAULT_RESAMPLE: &str = "NearestNeighbour";

/// Cutline input: a polygon in world coordinates, a `.geojson` file, or an
/// inline GeoJSON value. Anything else is an argument error.
#[derive(Debug, Clone)]
pub enum Clipper {
    Polygon(Polygon<f64>),
    Path(PathBuf),
    GeoJson(serde_json::Value),
}

impl Clipper {
    fn resolve(&self) -> Result<Polygon<f64>> {
        match self {
            Clipper::Polygon(polygon) => Ok(polygon.clone()),
            Clipper::Path(path) => {
                if path.extension().and_then(|e| e.to_str()) != Some("geojson") {
                    return Err(VrtError::InvalidClipper(format!(
                        "{} is not a .geojson file",
                        path.display()
                    )));
                }
                polygon_from_geojson(&std::fs::read_to_string(path)?)
            }
            Clipper::GeoJson(value) => polygon_from_geojson(&value.to_string()),
        }
    }
}

fn polygon_from_geojson(text: &str) -> Result<Polygon<f64>> {
    let geojson: geojson::GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| VrtError::InvalidClipper(e.to_string()))?;
    let geometry = match geojson {
        geojson::GeoJson::Geometry(geometry) => geometry,
        geojson::GeoJson::Feature(feature) => feature
            .geometry
            .ok_or_else(|| VrtError::InvalidClipper("feature has no geometry".to_string()))?,
        geojson::GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .find_map(|feature| feature.geometry)
            .ok_or_else(|| VrtError::InvalidClipper("collection has no geometry".to_string()))?,
    };
    match geo::Geometry::<f64>::try_from(geometry) {
        Ok(geo::Geometry::Polygon(polygon)) => Ok(polygon),
        Ok(_) => Err(VrtError::InvalidClipper(
            "clipper geometry is not a polygon".to_string(),
        )),
        Err(e) => Err(VrtError::InvalidClipper(e.to_string())),
    }
}

/// Options for [`warp`].
#[derive(Debug, Clone)]
pub struct WarpOptions {
    /// Target EPSG code; reprojects extent and resolution when set.
    pub dst_srs: Option<u32>,
    pub clipper: Option<Clipper>,
    /// Shrink the output extent to the cutline's bounding box.
    pub crop_to_cutline: bool,
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub x_res: Option<f64>,
    pub y_res: Option<f64>,
    /// Append a synthesized alpha band.
    pub dst_alpha: bool,
    pub resample: String,
}

impl Default for WarpOptions {
    fn default() -> Self {
        Self {
            dst_srs: None,
            clipper: None,
            crop_to_cutline: false,
            height: None,
            width: None,
            x_res: None,
            y_res: None,
            dst_alpha: false,
            resample: DEFAULT_RESAMPLE.to_string(),
        }
    }
}

impl WarpOptions {
    fn validate(&self) -> Result<()> {
        if (self.height.is_some() || self.width.is_some())
            && (self.x_res.is_some() || self.y_res.is_some())
        {
            return Err(VrtError::MutuallyExclusive("height/width", "xRes/yRes"));
        }
        Ok(())
    }
}

fn extent_of(gt: &GeoTransform, xsize: i64, ysize: i64) -> [f64; 4] {
    [
        gt.tlx(),
        gt.tlx() + xsize as f64 * gt.xres(),
        gt.tly() - ysize as f64 * gt.yres(),
        gt.tly(),
    ]
}

/// Convert a plain dataset to warped form and warp it in one go.
pub fn warp_dataset(
    input: &Dataset,
    opts: &WarpOptions,
    srs: &dyn SrsService,
) -> Result<WarpedDataset> {
    warp(&WarpedDataset::from_dataset(input)?, opts, srs)
}

/// Produce a new warped dataset with the requested reprojection, clipping
/// and band synthesis applied. The input is never touched.
pub fn warp(
    input: &WarpedDataset,
    opts: &WarpOptions,
    srs: &dyn SrsService,
) -> Result<WarpedDataset> {
    opts.validate()?;
    let mut vrt = input.clone();
    let mut gt = vrt.geotransform()?;

    vrt.set_resample(&opts.resample)?;

    let mut reprojection = None;
    if let Some(dst_epsg) = opts.dst_srs {
        let src_epsg = vrt.epsg()?;
        let src_wkt = vrt
            .srs()
            .ok_or_else(|| VrtError::MissingField("SRS".to_string()))?;
        let out_wkt = srs.definition(dst_epsg)?;
        let (xsize, ysize) = (vrt.xsize()?, vrt.ysize()?);
        let extent = extent_of(&gt, xsize, ysize);

        // Resolution preserves the pixel count along the diagonal: the
        // projected corner-to-corner distance spans as many pixels as the
        // source diagonal did.
        let source_diag = ((xsize * xsize + ysize * ysize) as f64).sqrt();
        let tl = srs.transform(src_epsg, dst_epsg, (extent[0], extent[3]))?;
        let bl = srs.transform(src_epsg, dst_epsg, (extent[0], extent[2]))?;
        let br = srs.transform(src_epsg, dst_epsg, (extent[1], extent[2]))?;
        let tr = srs.transform(src_epsg, dst_epsg, (extent[1], extent[3]))?;
        let tl_corner = (tl.0.min(bl.0), tl.1.max(tr.1));
        let br_corner = (tr.0.max(br.0), bl.1.min(br.1));
        let proj_diag = ((br.0 - tl.0).powi(2) + (tl.1 - br.1).powi(2)).sqrt();
        let res = proj_diag / source_diag;
        let cols = ((br_corner.0 - tl_corner.0) / res).round() as i64;
        let rows = ((tl_corner.1 - br_corner.1) / res).round() as i64;
        debug!("EPSG:{src_epsg} -> EPSG:{dst_epsg}: res {res}, {cols}x{rows}");

        gt.load([tl_corner.0, res, 0.0, tl_corner.1, 0.0, -res]);
        vrt.install_reprojection(&src_wkt, &out_wkt)?;
        vrt.set_dst_geotransform(&gt)?;
        vrt.set_srs(&out_wkt)?;
        vrt.set_raster_size(cols, rows)?;
        reprojection = Some((src_epsg, dst_epsg));
    }

    if let Some(clipper) = &opts.clipper {
        let geometry = clipper.resolve()?;

        // Cutline coordinates live in source pixel space: use the document
        // element geotransform, which still holds the pre-warp values.
        let doc_gt = vrt.geotransform()?;
        let cutline = geometry.map_coords(|c| {
            let (x, y) = doc_gt.world_to_pixel(c.x, c.y);
            Coord { x, y }
        });
        vrt.set_cutline(&cutline.wkt_string())?;

        if opts.crop_to_cutline {
            let geometry = match reprojection {
                Some((from, to)) => geometry.try_map_coords(|c| {
                    srs.transform(from, to, (c.x, c.y))
                        .map(|(x, y)| Coord { x, y })
                })?,
                None => geometry,
            };
            let bounds = geometry.bounding_rect().ok_or_else(|| {
                VrtError::InvalidClipper("cutline polygon has no extent".to_string())
            })?;
            let (xmin, ymin) = (bounds.min().x, bounds.min().y);
            let (xmax, ymax) = (bounds.max().x, bounds.max().y);
            let xsize = ((xmax - xmin) / gt.xres()).round() as i64;
            let ysize = ((ymax - ymin) / gt.yres()).round() as i64;
            gt.load([
                xmin,
                (xmax - xmin) / xsize as f64,
                0.0,
                ymax,
                0.0,
                -((ymax - ymin) / ysize as f64),
            ]);
            vrt.set_raster_size(xsize, ysize)?;
        }
        vrt.set_dst_geotransform(&gt)?;
    }

    if opts.height.is_some() || opts.width.is_some() {
        let (xsize, ysize) = (vrt.xsize()?, vrt.ysize()?);
        let extent = extent_of(&gt, xsize, ysize);
        let (width, height, x_res, y_res) = match (opts.width, opts.height) {
            (Some(width), Some(height)) => (
                width,
                height,
                gt.xres() * xsize as f64 / width as f64,
                gt.yres() * ysize as f64 / height as f64,
            ),
            (Some(width), None) => {
                let x_res = gt.xres() * xsize as f64 / width as f64;
                let height = ((extent[3] - extent[2]) / x_res).round() as i64;
                (width, height, x_res, x_res)
            }
            (None, Some(height)) => {
                let y_res = gt.yres() * ysize as f64 / height as f64;
                let width = ((extent[1] - extent[0]) / y_res).round() as i64;
                (width, height, y_res, y_res)
            }
            (None, None) => unreachable!(),
        };
        gt.set_xres(x_res);
        gt.set_yres(y_res);
        vrt.set_raster_size(width, height)?;
    } else if let (Some(x_res), Some(y_res)) = (opts.x_res, opts.y_res) {
        let (xsize, ysize) = (vrt.xsize()?, vrt.ysize()?);
        let width = ((gt.xres() * xsize as f64) / x_res).round() as i64;
        let height = ((gt.yres() * ysize as f64) / y_res).round() as i64;
        gt.set_xres(x_res);
        gt.set_yres(y_res);
        vrt.set_raster_size(width, height)?;
    }

    if opts.dst_alpha {
        vrt.add_band(true)?;
        let bands = vrt.band_count()? as i64;
        vrt.set_dst_alpha_band(bands)?;
        let depth = vrt.bitdepth()?;
        let max = depth
            .max_value()
            .ok_or_else(|| VrtError::UnsupportedDataType(depth.to_string()))?;
        vrt.add_option("DST_ALPHA_MAX", serde_json::json!((max - 1.0) as i64))?;
        // An alpha band makes explicit nodata redundant.
        vrt.zero_option("INIT_DEST")?;
        vrt.reset_nodata()?;
        vrt.filter_band_properties(&["ColorInterp", "@dataType", "@band", "@subClass"])?;
    }

    // Tiny outputs get block sizes no larger than themselves.
    let blocksize = vrt.blocksize()?;
    let (xsize, ysize) = (vrt.xsize()?, vrt.ysize()?);
    if blocksize[0].min(blocksize[1]) > xsize.max(ysize) {
        vrt.set_blocksize([xsize, ysize])?;
    }

    vrt.set_geotransform(&gt)?;
    Ok(vrt)
}
