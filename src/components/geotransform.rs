use itertools::Itertools;

use crate::errors::{Result, VrtError};

/// Working copy of a six-coefficient geotransform.
///
/// Maps pixel coordinates to world coordinates as
/// `x = gt[0] + col * gt[1]`, `y = gt[3] + row * gt[5]` (rotation terms
/// `gt[2]`/`gt[4]` are always zero here). Translate and warp both need the
/// old and the new transform at once, so engines pull a copy out of the
/// document, update it as they go, and write it back at the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform([f64; 6]);

impl GeoTransform {
    pub fn new(gt: [f64; 6]) -> Self {
        Self(gt)
    }

    /// Parse from the comma-joined element string.
    pub fn from_element(element: &str) -> Result<Self> {
        let values = element
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| VrtError::Malformed(format!("GeoTransform element {element:?}")))?;
        let gt: [f64; 6] = values
            .try_into()
            .map_err(|_| VrtError::Malformed(format!("GeoTransform element {element:?}")))?;
        Ok(Self(gt))
    }

    /// Dump to the comma-joined element string.
    pub fn to_element(&self) -> String {
        self.0.iter().map(|v| v.to_string()).join(",")
    }

    /// Dump the inverse transform to the element string.
    pub fn inverse_element(&self) -> Result<String> {
        Ok(GeoTransform(self.inverse()?).to_element())
    }

    /// The inverse geotransform.
    ///
    /// Zero resolution makes the transform singular; that is a caller
    /// precondition violation, not something to paper over.
    pub fn inverse(&self) -> Result<[f64; 6]> {
        let gt = &self.0;
        if gt[1] == 0.0 || gt[5] == 0.0 {
            return Err(VrtError::ZeroResolution);
        }
        Ok([
            -(gt[0] / gt[1]),
            1.0 / gt[1],
            0.0,
            gt[3] / gt[1],
            0.0,
            1.0 / gt[5],
        ])
    }

    /// Replace all six coefficients at once.
    pub fn load(&mut self, gt: [f64; 6]) {
        self.0 = gt;
    }

    /// Forward map: pixel `(col, row)` to world `(x, y)`.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.0[0] + col * self.0[1],
            self.0[3] + row * self.0[5],
        )
    }

    /// Inverse map: world `(x, y)` to pixel `(col, row)`.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.tlx()) / self.xres(), (self.tly() - y) / self.yres())
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    pub fn tlx(&self) -> f64 {
        self.0[0]
    }

    pub fn set_tlx(&mut self, value: f64) {
        self.0[0] = value;
    }

    pub fn tly(&self) -> f64 {
        self.0[3]
    }

    pub fn set_tly(&mut self, value: f64) {
        self.0[3] = value;
    }

    pub fn xres(&self) -> f64 {
        self.0[1]
    }

    pub fn set_xres(&mut self, value: f64) {
        self.0[1] = value;
    }

    /// Y resolution as a positive magnitude; the stored coefficient is
    /// always negative (north-up convention).
    pub fn yres(&self) -> f64 {
        self.0[5].abs()
    }

    pub fn set_yres(&mut self, value: f64) {
        self.0[5] = -value.abs();
    }
}
