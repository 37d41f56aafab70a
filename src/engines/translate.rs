//! Subsetting, resampling and band selection within one projection.

use log::debug;

use crate::components::dataset::{Dataset, SourceKind, VrtDocument};
use crate::errors::{Result, VrtError};

/// Options for [`translate`]. Everything is optional; the default set is a
/// plain copy (modulo the unconditional corner recompute).
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Bands to keep, 1-based, in output order.
    pub band_list: Option<Vec<usize>>,
    /// Pixel-space window `[xoff, yoff, xsize, ysize]`.
    pub src_win: Option<[i64; 4]>,
    /// World-space window `[xmin, ymax, xmax, ymin]`.
    pub proj_win: Option<[f64; 4]>,
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub x_res: Option<f64>,
    pub y_res: Option<f64>,
    pub nodata: Option<f64>,
    pub resample_alg: Option<String>,
    /// `[srcMin, srcMax, dstMin, dstMax]`.
    pub scale_params: Option<[f64; 4]>,
}

impl TranslateOptions {
    fn validate(&self) -> Result<()> {
        if self.src_win.is_some() && self.proj_win.is_some() {
            return Err(VrtError::MutuallyExclusive("srcWin", "projWin"));
        }
        if (self.height.is_some() || self.width.is_some())
            && (self.x_res.is_some() || self.y_res.is_some())
        {
            return Err(VrtError::MutuallyExclusive("height/width", "xRes/yRes"));
        }
        Ok(())
    }
}

/// Produce a new dataset with the requested subsetting applied. The input
/// is never touched; validation failures leave nothing behind.
pub fn translate(input: &Dataset, opts: &TranslateOptions) -> Result<Dataset> {
    opts.validate()?;
    let mut vrt = input.clone();
    let mut gt = vrt.geotransform()?;

    // Bands first: the window and size arithmetic below reads band 1.
    if let Some(list) = &opts.band_list {
        vrt.select_bands(list)?;
    }

    let window = match (opts.src_win, opts.proj_win) {
        (Some(win), None) => Some(win),
        (None, Some(pw)) => {
            let (xoff, yoff) = gt.world_to_pixel(pw[0], pw[1]);
            let win = [
                xoff.round() as i64,
                yoff.round() as i64,
                ((pw[2] - pw[0]) / gt.xres()).round() as i64,
                ((pw[1] - pw[3]) / gt.yres()).round() as i64,
            ];
            debug!("projWin {pw:?} resolved to srcWin {win:?}");
            Some(win)
        }
        _ => None,
    };
    if let Some(win) = window {
        vrt.set_src_rect(win)?;
        vrt.set_dst_rect([0, 0, win[2], win[3]])?;
    }

    // The top-left corner always follows the source offset, whether or not
    // a window was requested.
    let src_rect = vrt.src_rect()?;
    gt.set_tlx(src_rect[0] as f64 * gt.xres() + gt.tlx());
    gt.set_tly(gt.tly() - src_rect[1] as f64 * gt.yres());

    if opts.height.is_some() || opts.width.is_some() {
        let (width, height) = match (opts.width, opts.height) {
            (Some(width), Some(height)) => (width, height),
            (Some(width), None) => {
                let ratio = src_rect[2] as f64 / width as f64;
                (width, (src_rect[3] as f64 / ratio).round() as i64)
            }
            (None, Some(height)) => {
                let ratio = src_rect[3] as f64 / height as f64;
                ((src_rect[2] as f64 / ratio).round() as i64, height)
            }
            (None, None) => unreachable!(),
        };
        vrt.set_dst_rect([0, 0, width, height])?;
        gt.set_xres(gt.xres() * src_rect[2] as f64 / width as f64);
        gt.set_yres(gt.yres() * src_rect[3] as f64 / height as f64);
    } else if let (Some(x_res), Some(y_res)) = (opts.x_res, opts.y_res) {
        let width = ((gt.xres() * src_rect[2] as f64) / x_res).round() as i64;
        let height = ((gt.yres() * src_rect[3] as f64) / y_res).round() as i64;
        vrt.set_dst_rect([0, 0, width, height])?;
        gt.set_xres(x_res);
        gt.set_yres(y_res);
    }

    vrt.set_geotransform(&gt)?;
    let dst_rect = vrt.dst_rect()?;
    vrt.set_raster_size(dst_rect[2], dst_rect[3])?;

    if let Some(scale) = opts.scale_params {
        // Ratio is dstMax / srcMax; the offset stays 0.
        vrt.set_scale_ratio(scale[3] / scale[1])?;
        vrt.set_scale_offset(0.0)?;
        vrt.change_source(SourceKind::Complex)?;
    }

    if let Some(nodata) = opts.nodata {
        vrt.set_nodata(nodata)?;
    }
    if let Some(algorithm) = &opts.resample_alg {
        vrt.set_resampling(algorithm)?;
    }
    Ok(vrt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Dataset {
        Dataset::from_text(include_str!("../../tests/data/translate.json")).unwrap()
    }

    #[test]
    fn window_forms_are_mutually_exclusive() {
        let opts = TranslateOptions {
            src_win: Some([0, 0, 10, 10]),
            proj_win: Some([0.0, 0.0, 10.0, 10.0]),
            ..Default::default()
        };
        let err = translate(&fixture(), &opts).unwrap_err();
        assert!(err.is_argument_error());
    }

    #[test]
    fn size_and_resolution_are_mutually_exclusive() {
        let opts = TranslateOptions {
            height: Some(100),
            x_res: Some(30.0),
            ..Default::default()
        };
        assert!(matches!(
            translate(&fixture(), &opts),
            Err(VrtError::MutuallyExclusive(_, _))
        ));
    }

    #[test]
    fn input_is_never_mutated() {
        let input = fixture();
        let before = input.to_text().unwrap();
        let opts = TranslateOptions {
            band_list: Some(vec![2, 1]),
            src_win: Some([100, 200, 400, 300]),
            nodata: Some(7.0),
            ..Default::default()
        };
        translate(&input, &opts).unwrap();
        assert_eq!(input.to_text().unwrap(), before);
    }
}
