pub mod dataset;
pub mod geotransform;
pub mod parser;
pub(crate) mod tree;
pub mod warped;

pub use dataset::{Dataset, SourceKind, VrtDocument};
pub use geotransform::GeoTransform;
pub use warped::WarpedDataset;

use crate::errors::{Result, VrtError};

/// The in-memory document tree. Ordered maps keep sibling bands in
/// declaration order; unknown fields pass through untouched.
pub type Document = serde_json::Value;

/// Pixel data type tag carried by every band of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "Byte" => Ok(DataType::Byte),
            "UInt16" => Ok(DataType::UInt16),
            "Int16" => Ok(DataType::Int16),
            "UInt32" => Ok(DataType::UInt32),
            "Int32" => Ok(DataType::Int32),
            "Float32" => Ok(DataType::Float32),
            "Float64" => Ok(DataType::Float64),
            other => Err(VrtError::UnsupportedDataType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        }
    }

    /// Exclusive upper bound of the representable range; floats have none.
    pub fn max_value(&self) -> Option<f64> {
        match self {
            DataType::Byte => Some((1u64 << 8) as f64),
            DataType::UInt16 => Some((1u64 << 16) as f64),
            DataType::Int16 => Some((1u64 << 15) as f64),
            DataType::UInt32 => Some((1u64 << 32) as f64),
            DataType::Int32 => Some((1u64 << 31) as f64),
            DataType::Float32 | DataType::Float64 => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = VrtError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DataType::Byte, 256.0)]
    #[case(DataType::UInt16, 65536.0)]
    #[case(DataType::Int16, 32768.0)]
    #[case(DataType::UInt32, 4294967296.0)]
    #[case(DataType::Int32, 2147483648.0)]
    fn integer_maxima(#[case] dt: DataType, #[case] max: f64) {
        assert_eq!(dt.max_value(), Some(max));
        assert!(!dt.is_float());
    }

    #[test]
    fn float_types_have_no_maximum() {
        assert_eq!(DataType::Float32.max_value(), None);
        assert!(DataType::Float64.is_float());
    }

    #[test]
    fn tag_roundtrip() {
        for tag in ["Byte", "UInt16", "Int16", "UInt32", "Int32", "Float32", "Float64"] {
            assert_eq!(DataType::parse(tag).unwrap().as_str(), tag);
        }
        assert!(DataType::parse("CInt16").is_err());
    }
}
