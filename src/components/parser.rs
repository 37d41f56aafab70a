//! Load/dump collaborator for the document dialect.
//!
//! The core never parses the external XML dialect itself; it speaks the
//! equivalent JSON mapping (attributes as `"@name"`, text as `"$"`,
//! repeated elements as arrays) and leaves XML conversion to whoever sits
//! at the boundary. Loading coerces single-child elements, which arrive as
//! plain objects, into one-element arrays so positional access is uniform.

use crate::components::{tree, Document};
use crate::errors::Result;

pub fn load(text: &str) -> Result<Document> {
    let mut document: Document = serde_json::from_str(text)?;
    normalize(&mut document);
    Ok(document)
}

pub fn dump(document: &Document) -> Result<String> {
    Ok(serde_json::to_string(document)?)
}

pub fn dump_pretty(document: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

fn normalize(document: &mut Document) {
    if let Some(root) = document.get_mut("VRTDataset") {
        tree::ensure_array(root, "VRTRasterBand");
        if let Some(options) = root.get_mut("GDALWarpOptions") {
            tree::ensure_array(options, "Option");
            if let Some(band_list) = options.get_mut("BandList") {
                tree::ensure_array(band_list, "BandMapping");
            }
        }
    }
}
