use serde_json::{json, Value};

use crate::components::dataset::{Dataset, VrtDocument};
use crate::components::geotransform::GeoTransform;
use crate::components::{parser, tree, DataType, Document};
use crate::errors::{Result, VrtError};

/// Path from `GDALWarpOptions` down to the image-projection transformer.
const TRANSFORMER: [&str; 4] = [
    "Transformer",
    "ApproxTransformer",
    "BaseTransformer",
    "GenImgProjTransformer",
];

/// A warped dataset: bands carry no sources, the mapping from source to
/// output lives in a document-level warp-options block instead.
#[derive(Debug, Clone)]
pub struct WarpedDataset {
    data: Document,
}

impl VrtDocument for WarpedDataset {
    fn document(&self) -> &Document {
        &self.data
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.data
    }
}

impl WarpedDataset {
    pub fn from_document(mut data: Document) -> Result<Self> {
        let root = tree::child_mut(&mut data, "VRTDataset")?;
        if root.get("@subClass").and_then(Value::as_str) != Some("VRTWarpedDataset") {
            return Err(VrtError::Malformed(
                "plain document where a warped one was expected".to_string(),
            ));
        }
        tree::ensure_array(root, "VRTRasterBand");
        let options = tree::child_mut(root, "GDALWarpOptions")?;
        tree::ensure_array(options, "Option");
        if let Ok(band_list) = tree::child_mut(options, "BandList") {
            tree::ensure_array(band_list, "BandMapping");
        }
        let vrt = Self { data };
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

    /// Convert a plain dataset into warped form: bands lose their sources
    /// and a full warp-options block is built from the document's current
    /// georeferencing (destination initially equal to source).
    pub fn from_dataset(vrt: &Dataset) -> Result<Self> {
        let gt = vrt.geotransform()?;
        let element = gt.to_element();
        let inverse = gt.inverse_element()?;
        let (xsize, ysize) = (vrt.xsize()?, vrt.ysize()?);
        let nodata = vrt.nodata();
        let blocksize = vrt.blocksize()?;

        let bands: Vec<Value> = vrt
            .bands()?
            .iter()
            .map(|band| {
                let mut out = json!({
                    "@dataType": band["@dataType"].clone(),
                    "@band": band["@band"].clone(),
                    "@subClass": "VRTWarpedRasterBand",
                });
                for key in ["ColorInterp", "NoDataValue"] {
                    if let Some(node) = band.get(key) {
                        out[key] = node.clone();
                    }
                }
                out
            })
            .collect();

        let mappings: Vec<Value> = (1..=bands.len() as i64)
            .map(|index| {
                let mut mapping = json!({ "@src": index, "@dst": index });
                if let Some(nodata) = nodata {
                    mapping["DstNoDataReal"] = json!({ "$": nodata });
                    mapping["DstNoDataImag"] = json!({ "$": 0.0 });
                }
                mapping
            })
            .collect();

        let mut root = json!({
            "@rasterXSize": xsize,
            "@rasterYSize": ysize,
            "@subClass": "VRTWarpedDataset",
        });
        if let Some(srs) = vrt.srs() {
            root["SRS"] = json!({ "$": srs });
        }
        root["GeoTransform"] = json!({ "$": element.as_str() });
        root["BlockXSize"] = json!({ "$": blocksize[0] });
        root["BlockYSize"] = json!({ "$": blocksize[1] });
        root["VRTRasterBand"] = Value::Array(bands);
        root["GDALWarpOptions"] = json!({
            "WarpMemoryLimit": { "$": 6.71089e7 },
            "ResampleAlg": { "$": "NearestNeighbour" },
            "WorkingDataType": { "$": vrt.bitdepth()?.as_str() },
            "Option": [{ "@name": "INIT_DEST", "$": 0 }],
            "SourceDataset": { "@relativeToVRT": 1, "$": vrt.filename()? },
            "Transformer": { "ApproxTransformer": {
                "MaxError": { "$": 0.125 },
                "BaseTransformer": { "GenImgProjTransformer": {
                    "SrcGeoTransform": { "$": element.as_str() },
                    "SrcInvGeoTransform": { "$": inverse.as_str() },
                    "DstGeoTransform": { "$": element.as_str() },
                    "DstInvGeoTransform": { "$": inverse.as_str() },
                }},
            }},
            "BandList": { "BandMapping": mappings },
        });
        Ok(Self {
            data: json!({ "VRTDataset": root }),
        })
    }

    fn options(&self) -> Result<&Value> {
        tree::descend(self.document(), &["VRTDataset", "GDALWarpOptions"])
    }

    fn options_mut(&mut self) -> Result<&mut Value> {
        tree::descend_mut(self.document_mut(), &["VRTDataset", "GDALWarpOptions"])
    }

    pub fn filename(&self) -> Result<String> {
        let node = tree::descend(self.options()?, &["SourceDataset", "$"])?;
        Ok(tree::as_str(node)?.to_string())
    }

    pub fn set_filename(&mut self, filename: &str) -> Result<()> {
        let node = tree::descend_mut(self.options_mut()?, &["SourceDataset"])?;
        node["$"] = json!(filename);
        Ok(())
    }

    /// Root-level block size `[x, y]`.
    pub fn blocksize(&self) -> Result<[i64; 2]> {
        let root = self.root()?;
        Ok([
            tree::as_i64(tree::text(tree::child(root, "BlockXSize")?)?)?,
            tree::as_i64(tree::text(tree::child(root, "BlockYSize")?)?)?,
        ])
    }

    pub fn set_blocksize(&mut self, blocksize: [i64; 2]) -> Result<()> {
        let root = self.root_mut()?;
        tree::set_text(root, "BlockXSize", json!(blocksize[0]));
        tree::set_text(root, "BlockYSize", json!(blocksize[1]));
        Ok(())
    }

    pub fn warp_memory_limit(&self) -> Result<f64> {
        tree::as_f64(tree::descend(self.options()?, &["WarpMemoryLimit", "$"])?)
    }

    pub fn set_warp_memory_limit(&mut self, bytes: f64) -> Result<()> {
        tree::set_text(self.options_mut()?, "WarpMemoryLimit", json!(bytes));
        Ok(())
    }

    pub fn resample(&self) -> Result<String> {
        let node = tree::descend(self.options()?, &["ResampleAlg", "$"])?;
        Ok(tree::as_str(node)?.to_string())
    }

    pub fn set_resample(&mut self, algorithm: &str) -> Result<()> {
        tree::set_text(self.options_mut()?, "ResampleAlg", json!(algorithm));
        Ok(())
    }

    pub fn working_data_type(&self) -> Result<DataType> {
        let node = tree::descend(self.options()?, &["WorkingDataType", "$"])?;
        DataType::parse(tree::as_str(node)?)
    }

    pub fn set_working_data_type(&mut self, data_type: DataType) -> Result<()> {
        tree::set_text(self.options_mut()?, "WorkingDataType", json!(data_type.as_str()));
        Ok(())
    }

    fn transformer(&self) -> Result<&Value> {
        tree::descend(self.options()?, &TRANSFORMER)
    }

    pub fn src_geotransform(&self) -> Result<GeoTransform> {
        let node = tree::descend(self.transformer()?, &["SrcGeoTransform", "$"])?;
        GeoTransform::from_element(tree::as_str(node)?)
    }

    pub fn dst_geotransform(&self) -> Result<GeoTransform> {
        let node = tree::descend(self.transformer()?, &["DstGeoTransform", "$"])?;
        GeoTransform::from_element(tree::as_str(node)?)
    }

    /// Write the destination geotransform and its inverse into the
    /// transformer chain.
    pub fn set_dst_geotransform(&mut self, gt: &GeoTransform) -> Result<()> {
        let element = gt.to_element();
        let inverse = gt.inverse_element()?;
        let transformer = tree::descend_mut(self.options_mut()?, &TRANSFORMER)?;
        tree::set_text(transformer, "DstGeoTransform", json!(element));
        tree::set_text(transformer, "DstInvGeoTransform", json!(inverse));
        Ok(())
    }

    /// Install (or replace) the reprojection sub-block of the transformer.
    pub fn install_reprojection(&mut self, source_wkt: &str, target_wkt: &str) -> Result<()> {
        let transformer = tree::descend_mut(self.options_mut()?, &TRANSFORMER)?;
        transformer["ReprojectTransformer"] = json!({
            "ReprojectionTransformer": {
                "SourceSRS": { "$": source_wkt },
                "TargetSRS": { "$": target_wkt },
            }
        });
        Ok(())
    }

    /// Cutline polygon as well-known text in source pixel space.
    pub fn cutline(&self) -> Option<String> {
        let node = tree::descend(self.options().ok()?, &["Cutline", "$"]).ok()?;
        node.as_str().map(str::to_string)
    }

    pub fn set_cutline(&mut self, wkt: &str) -> Result<()> {
        tree::set_text(self.options_mut()?, "Cutline", json!(wkt));
        Ok(())
    }

    pub fn dst_alpha_band(&self) -> Option<i64> {
        let node = tree::descend(self.options().ok()?, &["DstAlphaBand", "$"]).ok()?;
        tree::as_i64(node).ok()
    }

    pub fn set_dst_alpha_band(&mut self, band: i64) -> Result<()> {
        tree::set_text(self.options_mut()?, "DstAlphaBand", json!(band));
        Ok(())
    }

    /// Append a free-form warp option.
    pub fn add_option(&mut self, name: &str, value: Value) -> Result<()> {
        let options = tree::array_mut(self.options_mut()?, "Option")?;
        options.push(json!({ "@name": name, "$": value }));
        Ok(())
    }

    /// Set the named warp option's value to zero.
    pub fn zero_option(&mut self, name: &str) -> Result<()> {
        let options = tree::array_mut(self.options_mut()?, "Option")?;
        let option = options
            .iter_mut()
            .find(|option| option.get("@name").and_then(Value::as_str) == Some(name))
            .ok_or_else(|| VrtError::MissingField(format!("Option {name}")))?;
        option["$"] = json!(0);
        Ok(())
    }

    /// Strip the per-band destination nodata mapping.
    pub fn reset_nodata(&mut self) -> Result<()> {
        let band_list = tree::child_mut(self.options_mut()?, "BandList")?;
        for mapping in tree::array_mut(band_list, "BandMapping")? {
            if let Some(object) = mapping.as_object_mut() {
                object.shift_remove("DstNoDataReal");
                object.shift_remove("DstNoDataImag");
            }
        }
        Ok(())
    }

    /// Append one band cloned from band 1. An alpha band gets the alpha
    /// color interpretation; any other clone drops it as ambiguous and
    /// extends the warp band mapping instead.
    pub fn add_band(&mut self, alpha: bool) -> Result<()> {
        let next = self.band_count()? as i64 + 1;
        let mut band = self.get_band(1)?.clone();
        band["@band"] = json!(next);
        if alpha {
            tree::set_text(&mut band, "ColorInterp", json!("Alpha"));
        } else if let Some(object) = band.as_object_mut() {
            object.shift_remove("ColorInterp");
        }
        self.bands_mut()?.push(band);

        if !alpha {
            let band_list = tree::child_mut(self.options_mut()?, "BandList")?;
            let mappings = tree::array_mut(band_list, "BandMapping")?;
            let mut mapping = mappings
                .first()
                .ok_or_else(|| VrtError::MissingField("BandMapping".to_string()))?
                .clone();
            mapping["@src"] = json!(next);
            mapping["@dst"] = json!(next);
            mappings.push(mapping);
        }
        Ok(())
    }

    pub fn add_bands(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.add_band(false)?;
        }
        Ok(())
    }

    /// Drop every band attribute not in the allowed set.
    pub fn filter_band_properties(&mut self, allowed: &[&str]) -> Result<()> {
        for band in self.bands_mut()? {
            if let Some(object) = band.as_object_mut() {
                object.retain(|key, _| allowed.contains(&key.as_str()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> WarpedDataset {
        WarpedDataset::from_text(include_str!("../../tests/data/warped.json")).unwrap()
    }

    fn plain() -> Dataset {
        Dataset::from_text(include_str!("../../tests/data/translate.json")).unwrap()
    }

    #[test]
    fn warp_options_accessors() {
        let vrt = fixture();
        assert_eq!(vrt.resample().unwrap(), "NearestNeighbour");
        assert_eq!(vrt.working_data_type().unwrap(), DataType::UInt16);
        assert_eq!(vrt.filename().unwrap(), "input.tif");
        assert_eq!(vrt.blocksize().unwrap(), [512, 512]);
        assert_eq!(vrt.cutline(), None);
        assert_eq!(vrt.dst_alpha_band(), None);
        assert_eq!(
            vrt.src_geotransform().unwrap(),
            vrt.dst_geotransform().unwrap()
        );
    }

    #[test]
    fn single_option_node_is_normalized_to_an_array() {
        let vrt = fixture();
        let options = tree::array(vrt.options().unwrap(), "Option").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0]["@name"], "INIT_DEST");
    }

    #[test]
    fn from_dataset_builds_the_full_options_block() {
        let warped = WarpedDataset::from_dataset(&plain()).unwrap();
        assert_eq!(warped.band_count().unwrap(), 4);
        assert_eq!(warped.resample().unwrap(), "NearestNeighbour");
        assert_eq!(warped.working_data_type().unwrap(), DataType::UInt16);
        assert_eq!(warped.filename().unwrap(), "input.tif");
        assert_eq!(warped.blocksize().unwrap(), [512, 512]);
        assert_eq!(
            warped.src_geotransform().unwrap(),
            warped.dst_geotransform().unwrap()
        );
        // Bands are warped and sourceless now.
        for band in warped.bands().unwrap() {
            assert_eq!(band["@subClass"], "VRTWarpedRasterBand");
            assert!(band.get("SimpleSource").is_none());
        }
        // Nodata echoed into the band mapping.
        let mapping = tree::descend(
            warped.options().unwrap(),
            &["BandList", "BandMapping"],
        )
        .unwrap();
        assert_eq!(mapping.as_array().unwrap().len(), 4);
        assert_eq!(mapping[0]["DstNoDataReal"]["$"], 0.0);
    }

    #[test]
    fn alpha_band_and_mapping_reset() {
        let mut vrt = fixture();
        vrt.add_band(true).unwrap();
        assert_eq!(vrt.band_count().unwrap(), 5);
        let alpha = vrt.get_band(5).unwrap();
        assert_eq!(alpha["ColorInterp"]["$"], "Alpha");
        // Alpha bands do not extend the mapping.
        let mappings = tree::descend(vrt.options().unwrap(), &["BandList", "BandMapping"]).unwrap();
        assert_eq!(mappings.as_array().unwrap().len(), 4);

        vrt.reset_nodata().unwrap();
        let mappings = tree::descend(vrt.options().unwrap(), &["BandList", "BandMapping"]).unwrap();
        assert!(mappings[0].get("DstNoDataReal").is_none());
        assert!(mappings[0].get("DstNoDataImag").is_none());
    }

    #[test]
    fn non_alpha_band_extends_the_mapping() {
        let mut vrt = fixture();
        vrt.add_band(false).unwrap();
        let mappings = tree::descend(vrt.options().unwrap(), &["BandList", "BandMapping"]).unwrap();
        assert_eq!(mappings.as_array().unwrap().len(), 5);
        assert_eq!(mappings[4]["@src"], 5);
        assert!(vrt.get_band(5).unwrap().get("ColorInterp").is_none());
    }

    #[test]
    fn band_filtering_keeps_only_allowed_attributes() {
        let mut vrt = fixture();
        vrt.filter_band_properties(&["ColorInterp", "@dataType", "@band", "@subClass"])
            .unwrap();
        for band in vrt.bands().unwrap() {
            assert!(band.get("NoDataValue").is_none());
            assert!(band.get("@dataType").is_some());
            assert!(band.get("@band").is_some());
        }
    }

    #[test]
    fn option_editing() {
        let mut vrt = fixture();
        vrt.add_option("DST_ALPHA_MAX", json!(65535)).unwrap();
        vrt.zero_option("INIT_DEST").unwrap();
        let options = tree::array(vrt.options().unwrap(), "Option").unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0]["$"], 0);
        assert_eq!(options[1]["@name"], "DST_ALPHA_MAX");
        assert!(vrt.zero_option("NO_SUCH_OPTION").is_err());
    }

    #[test]
    fn reprojection_block_install() {
        let mut vrt = fixture();
        vrt.install_reprojection("SOURCE_WKT", "TARGET_WKT").unwrap();
        let block = tree::descend(
            vrt.transformer().unwrap(),
            &["ReprojectTransformer", "ReprojectionTransformer"],
        )
        .unwrap();
        assert_eq!(block["SourceSRS"]["$"], "SOURCE_WKT");
        assert_eq!(block["TargetSRS"]["$"], "TARGET_WKT");
    }
}
