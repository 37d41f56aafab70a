//! Spatial-reference service boundary.
//!
//! Reprojection math is delegated: the engines only need a definition
//! string per EPSG code and a forward point transform between two codes.
//! Service failures surface as [`VrtError::Service`] / [`VrtError::UnknownCrs`],
//! distinct from argument-validation errors, and are never retried here.

use crate::errors::{Result, VrtError};

pub trait SrsService {
    /// Coordinate-system definition string (WKT) for an EPSG code.
    fn definition(&self, epsg: u32) -> Result<String>;

    /// Forward-transform a point from one EPSG system into another.
    fn transform(&self, from: u32, to: u32, point: (f64, f64)) -> Result<(f64, f64)>;
}

/// Offline EPSG registry: definitions from the bundled crs-definitions
/// database, point transforms through proj4rs. No network, no system
/// libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpsgRegistry;

impl EpsgRegistry {
    pub fn new() -> Self {
        Self
    }

    fn proj_string(epsg: u32) -> Result<&'static str> {
        u16::try_from(epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
            .ok_or(VrtError::UnknownCrs(epsg))
    }

    fn wkt_string(epsg: u32) -> Result<&'static str> {
        u16::try_from(epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.wkt)
            .ok_or(VrtError::UnknownCrs(epsg))
    }

    /// Geographic systems carry coordinates in degrees; proj4rs wants
    /// radians for those.
    pub fn is_geographic(epsg: u32) -> bool {
        match Self::proj_string(epsg) {
            Ok(proj) => proj.contains("+proj=longlat"),
            Err(_) => epsg == 4326 || (4000..5000).contains(&epsg),
        }
    }
}

impl SrsService for EpsgRegistry {
    fn definition(&self, epsg: u32) -> Result<String> {
        Ok(Self::wkt_string(epsg)?.to_string())
    }

    fn transform(&self, from: u32, to: u32, point: (f64, f64)) -> Result<(f64, f64)> {
        if from == to {
            return Ok(point);
        }
        let source = proj4rs::Proj::from_proj_string(Self::proj_string(from)?)
            .map_err(|e| VrtError::Service(format!("invalid projection EPSG:{from}: {e:?}")))?;
        let target = proj4rs::Proj::from_proj_string(Self::proj_string(to)?)
            .map_err(|e| VrtError::Service(format!("invalid projection EPSG:{to}: {e:?}")))?;

        let (x, y) = point;
        let mut coords = if Self::is_geographic(from) {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&source, &target, &mut coords).map_err(|e| {
            VrtError::Service(format!("transform EPSG:{from} -> EPSG:{to} failed: {e:?}"))
        })?;

        if Self::is_geographic(to) {
            Ok((coords.0.to_degrees(), coords.1.to_degrees()))
        } else {
            Ok((coords.0, coords.1))
        }
    }
}
