use log::warn;
use serde_json::{json, Value};

use crate::components::geotransform::GeoTransform;
use crate::components::{parser, tree, DataType, Document};
use crate::errors::{Result, VrtError};

/// The kind of per-band source descriptor a plain document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Simple,
    Complex,
}

impl SourceKind {
    pub fn key(&self) -> &'static str {
        match self {
            SourceKind::Simple => "SimpleSource",
            SourceKind::Complex => "ComplexSource",
        }
    }
}

/// Shared typed accessors over the document tree; implemented by both the
/// plain and the warped dataset wrappers.
///
/// All band-level setters mutate every band in lock-step: the model keeps
/// data type, nodata and source rectangles identical across bands.
pub trait VrtDocument {
    fn document(&self) -> &Document;
    fn document_mut(&mut self) -> &mut Document;

    fn root(&self) -> Result<&Value> {
        tree::child(self.document(), "VRTDataset")
    }

    fn root_mut(&mut self) -> Result<&mut Value> {
        tree::child_mut(self.document_mut(), "VRTDataset")
    }

    fn xsize(&self) -> Result<i64> {
        tree::as_i64(tree::child(self.root()?, "@rasterXSize")?)
    }

    fn ysize(&self) -> Result<i64> {
        tree::as_i64(tree::child(self.root()?, "@rasterYSize")?)
    }

    fn set_raster_size(&mut self, xsize: i64, ysize: i64) -> Result<()> {
        let root = self.root_mut()?;
        root["@rasterXSize"] = json!(xsize);
        root["@rasterYSize"] = json!(ysize);
        Ok(())
    }

    /// `(xsize, ysize, band count)`.
    fn shape(&self) -> Result<(i64, i64, usize)> {
        Ok((self.xsize()?, self.ysize()?, self.band_count()?))
    }

    /// The coordinate-system string, if the document has one.
    fn srs(&self) -> Option<String> {
        match tree::descend(self.document(), &["VRTDataset", "SRS", "$"]) {
            Ok(value) => value.as_str().map(str::to_string),
            Err(_) => {
                warn!("document has no coordinate system");
                None
            }
        }
    }

    fn set_srs(&mut self, wkt: &str) -> Result<()> {
        tree::set_text(self.root_mut()?, "SRS", json!(wkt));
        Ok(())
    }

    /// EPSG code parsed from the trailing AUTHORITY entry of the
    /// coordinate-system string.
    fn epsg(&self) -> Result<u32> {
        let srs = self
            .srs()
            .ok_or_else(|| VrtError::MissingField("SRS".to_string()))?;
        let tail = srs
            .rsplit(',')
            .next()
            .ok_or_else(|| VrtError::Malformed("SRS authority".to_string()))?;
        let digits: String = tail.chars().filter(char::is_ascii_digit).collect();
        digits
            .parse()
            .map_err(|_| VrtError::Malformed(format!("SRS authority {tail:?}")))
    }

    fn is_geographic(&self) -> bool {
        self.srs().is_some_and(|srs| srs.starts_with("GEOG"))
    }

    fn geotransform(&self) -> Result<GeoTransform> {
        let element = tree::descend(self.document(), &["VRTDataset", "GeoTransform", "$"])?;
        GeoTransform::from_element(tree::as_str(element)?)
    }

    fn set_geotransform(&mut self, gt: &GeoTransform) -> Result<()> {
        tree::set_text(self.root_mut()?, "GeoTransform", json!(gt.to_element()));
        Ok(())
    }

    /// World extent `[xmin, xmax, ymin, ymax]`.
    fn extent(&self) -> Result<[f64; 4]> {
        let gt = self.geotransform()?;
        let (xsize, ysize) = (self.xsize()?, self.ysize()?);
        Ok([
            gt.tlx(),
            gt.tlx() + xsize as f64 * gt.xres(),
            gt.tly() - ysize as f64 * gt.yres(),
            gt.tly(),
        ])
    }

    fn bands(&self) -> Result<&Vec<Value>> {
        tree::array(self.root()?, "VRTRasterBand")
    }

    fn bands_mut(&mut self) -> Result<&mut Vec<Value>> {
        tree::array_mut(self.root_mut()?, "VRTRasterBand")
    }

    fn band_count(&self) -> Result<usize> {
        Ok(self.bands()?.len())
    }

    /// Band node by 1-based index.
    fn get_band(&self, band: usize) -> Result<&Value> {
        self.bands()?
            .get(band - 1)
            .ok_or_else(|| VrtError::Malformed(format!("band {band} out of range")))
    }

    /// The `@band` indices in position order.
    fn bandorder(&self) -> Result<Vec<i64>> {
        self.bands()?
            .iter()
            .map(|band| tree::as_i64(tree::child(band, "@band")?))
            .collect()
    }

    fn bitdepth(&self) -> Result<DataType> {
        let tag = tree::child(self.get_band(1)?, "@dataType")?;
        DataType::parse(tree::as_str(tag)?)
    }

    fn set_bitdepth(&mut self, data_type: DataType) -> Result<()> {
        for band in self.bands_mut()? {
            band["@dataType"] = json!(data_type.as_str());
        }
        Ok(())
    }

    /// Nodata value of band 1, if declared.
    fn nodata(&self) -> Option<f64> {
        let band = self.get_band(1).ok()?;
        tree::as_f64(tree::descend(band, &["NoDataValue", "$"]).ok()?).ok()
    }

    fn set_nodata(&mut self, value: f64) -> Result<()> {
        for band in self.bands_mut()? {
            tree::set_text(band, "NoDataValue", json!(value));
        }
        Ok(())
    }

    /// Remove one band (1-based) and renumber the rest.
    fn drop_band(&mut self, band: usize) -> Result<()> {
        let bands = self.bands_mut()?;
        if band == 0 || band > bands.len() {
            return Err(VrtError::Malformed(format!("band {band} out of range")));
        }
        bands.remove(band - 1);
        renumber(bands);
        Ok(())
    }

    /// Remove several bands (1-based) and renumber the rest.
    fn drop_bands(&mut self, drop: &[usize]) -> Result<()> {
        let bands = self.bands_mut()?;
        let mut drop = drop.to_vec();
        drop.sort_unstable();
        drop.dedup();
        if drop.iter().any(|&b| b == 0 || b > bands.len()) {
            return Err(VrtError::Malformed(format!("band list {drop:?} out of range")));
        }
        for band in drop.into_iter().rev() {
            bands.remove(band - 1);
        }
        renumber(bands);
        Ok(())
    }

    /// Cache-key style name derived from georeferencing.
    fn geogname(&self) -> Result<String> {
        let gt = self.geotransform()?;
        Ok(format!(
            "tlx_{}__tly_{}__xres_{}__yres_{}__cols_{}__rows_{}",
            gt.tlx(),
            gt.tly(),
            gt.xres(),
            gt.yres(),
            self.xsize()?,
            self.ysize()?
        ))
    }
}

fn renumber(bands: &mut [Value]) {
    for (position, band) in bands.iter_mut().enumerate() {
        band["@band"] = json!(position as i64 + 1);
    }
}

/// A plain (translate-form) dataset: every band carries one source
/// descriptor mapping a window of the source file into the output.
#[derive(Debug, Clone)]
pub struct Dataset {
    data: Document,
    source: String,
}

impl VrtDocument for Dataset {
    fn document(&self) -> &Document {
        &self.data
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.data
    }
}

impl Dataset {
    pub fn from_document(mut data: Document) -> Result<Self> {
        let root = tree::child_mut(&mut data, "VRTDataset")?;
        if root.get("@subClass").and_then(Value::as_str) == Some("VRTWarpedDataset") {
            return Err(VrtError::Malformed(
                "warped document where a plain one was expected".to_string(),
            ));
        }
        tree::ensure_array(root, "VRTRasterBand");
        let band = tree::array(root, "VRTRasterBand")?
            .first()
            .ok_or_else(|| VrtError::MissingField("VRTRasterBand".to_string()))?;
        let source = band
            .as_object()
            .and_then(|band| band.keys().find(|key| key.contains("Source")))
            .cloned()
            .ok_or_else(|| VrtError::MissingField("band source".to_string()))?;
        let vrt = Self { data, source };
        // Fail early on an unusable geotransform, as every transform needs it.
        vrt.geotransform()?;
        Ok(vrt)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_document(parser::load(text)?)
    }

    pub fn to_text(&self) -> Result<String> {
        parser::dump(self.document())
    }

    pub fn into_document(self) -> Document {
        self.data
    }

    /// Key of the per-band source node (`SimpleSource`, `ComplexSource`, ...).
    pub fn source_key(&self) -> &str {
        &self.source
    }

    pub fn filename(&self) -> Result<String> {
        let node = tree::descend(
            self.get_band(1)?,
            &[self.source_key(), "SourceFilename", "$"],
        )?;
        Ok(tree::as_str(node)?.to_string())
    }

    pub fn set_filename(&mut self, filename: &str) -> Result<()> {
        let source = self.source.clone();
        for band in self.bands_mut()? {
            let node = tree::descend_mut(band, &[source.as_str(), "SourceFilename"])?;
            node["$"] = json!(filename);
        }
        Ok(())
    }

    pub fn scale_ratio(&self) -> Option<f64> {
        let band = self.get_band(1).ok()?;
        let node = tree::descend(band, &[self.source_key(), "ScaleRatio", "$"]).ok()?;
        tree::as_f64(node).ok()
    }

    pub fn set_scale_ratio(&mut self, ratio: f64) -> Result<()> {
        let source = self.source.clone();
        for band in self.bands_mut()? {
            tree::set_text(tree::child_mut(band, &source)?, "ScaleRatio", json!(ratio));
        }
        Ok(())
    }

    pub fn scale_offset(&self) -> Option<f64> {
        let band = self.get_band(1).ok()?;
        let node = tree::descend(band, &[self.source_key(), "ScaleOffset", "$"]).ok()?;
        tree::as_f64(node).ok()
    }

    pub fn set_scale_offset(&mut self, offset: f64) -> Result<()> {
        let source = self.source.clone();
        for band in self.bands_mut()? {
            tree::set_text(tree::child_mut(band, &source)?, "ScaleOffset", json!(offset));
        }
        Ok(())
    }

    pub fn resampling(&self) -> String {
        self.get_band(1)
            .ok()
            .and_then(|band| tree::descend(band, &[self.source_key(), "@resampling"]).ok())
            .and_then(Value::as_str)
            .unwrap_or("NearestNeighbour")
            .to_string()
    }

    pub fn set_resampling(&mut self, algorithm: &str) -> Result<()> {
        let source = self.source.clone();
        for band in self.bands_mut()? {
            tree::child_mut(band, &source)?["@resampling"] = json!(algorithm);
        }
        Ok(())
    }

    /// Source block size `[x, y]` from band 1's source properties.
    pub fn blocksize(&self) -> Result<[i64; 2]> {
        let props = tree::descend(self.get_band(1)?, &[self.source_key(), "SourceProperties"])?;
        Ok([
            tree::as_i64(tree::child(props, "@BlockXSize")?)?,
            tree::as_i64(tree::child(props, "@BlockYSize")?)?,
        ])
    }

    pub fn src_rect(&self) -> Result<[i64; 4]> {
        self.rect("SrcRect")
    }

    pub fn set_src_rect(&mut self, rect: [i64; 4]) -> Result<()> {
        self.set_rect("SrcRect", rect)
    }

    pub fn dst_rect(&self) -> Result<[i64; 4]> {
        self.rect("DstRect")
    }

    pub fn set_dst_rect(&mut self, rect: [i64; 4]) -> Result<()> {
        self.set_rect("DstRect", rect)
    }

    fn rect(&self, which: &str) -> Result<[i64; 4]> {
        let rect = tree::descend(self.get_band(1)?, &[self.source_key(), which])?;
        Ok([
            tree::as_i64(tree::child(rect, "@xOff")?)?,
            tree::as_i64(tree::child(rect, "@yOff")?)?,
            tree::as_i64(tree::child(rect, "@xSize")?)?,
            tree::as_i64(tree::child(rect, "@ySize")?)?,
        ])
    }

    fn set_rect(&mut self, which: &str, rect: [i64; 4]) -> Result<()> {
        let source = self.source.clone();
        for band in self.bands_mut()? {
            let node = tree::descend_mut(band, &[source.as_str(), which])?;
            node["@xOff"] = json!(rect[0]);
            node["@yOff"] = json!(rect[1]);
            node["@xSize"] = json!(rect[2]);
            node["@ySize"] = json!(rect[3]);
        }
        Ok(())
    }

    /// Rewrap every band's source node under a new kind. Switching to the
    /// complex kind echoes the nodata value into the source and caps the
    /// source block size at `min(128, raster size)` per axis.
    pub fn change_source(&mut self, kind: SourceKind) -> Result<()> {
        let old = self.source.clone();
        let new = kind.key();
        if old == new {
            return Ok(());
        }
        let nodata = self.nodata();
        let (xsize, ysize) = (self.xsize()?, self.ysize()?);
        for band in self.bands_mut()? {
            let object = band
                .as_object_mut()
                .ok_or_else(|| VrtError::Malformed("band is not an element".to_string()))?;
            let source = object
                .shift_remove(&old)
                .ok_or_else(|| VrtError::MissingField(old.clone()))?;
            object.insert(new.to_string(), source);
            if kind == SourceKind::Complex {
                let source = &mut object[new];
                source["NODATA"] = json!({ "$": nodata });
                let props = tree::child_mut(source, "SourceProperties")?;
                props["@BlockXSize"] = json!(xsize.min(128));
                props["@BlockYSize"] = json!(ysize.min(128));
            }
        }
        self.source = new.to_string();
        Ok(())
    }

    /// Append one band cloned from band 1, with the next index and no
    /// color interpretation (ambiguous for a cloned band).
    pub fn add_band(&mut self) -> Result<()> {
        let mut band = self.get_band(1)?.clone();
        let next = self.band_count()? as i64 + 1;
        band["@band"] = json!(next);
        if let Some(object) = band.as_object_mut() {
            object.shift_remove("ColorInterp");
        }
        self.bands_mut()?.push(band);
        Ok(())
    }

    pub fn add_bands(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.add_band()?;
        }
        Ok(())
    }

    /// Keep only the listed bands (1-based), in list order. `@band` indices
    /// are renumbered `1..N` and each band's `SourceBand` reference takes
    /// the list entry at its position.
    pub fn select_bands(&mut self, list: &[usize]) -> Result<()> {
        let count = self.band_count()?;
        if list.iter().any(|&b| b == 0 || b > count) {
            return Err(VrtError::Malformed(format!(
                "band list {list:?} out of range for {count} bands"
            )));
        }
        let source = self.source.clone();
        let bands = self.bands_mut()?;
        let mut selected: Vec<Value> = list.iter().map(|&b| bands[b - 1].clone()).collect();
        for (position, band) in selected.iter_mut().enumerate() {
            band["@band"] = json!(position as i64 + 1);
            tree::set_text(
                tree::child_mut(band, &source)?,
                "SourceBand",
                json!(list[position] as i64),
            );
        }
        *bands = selected;
        Ok(())
    }
}
