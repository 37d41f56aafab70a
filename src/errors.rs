pub type Result<T> = std::result::Result<T, VrtError>;

#[derive(thiserror::Error, Debug)]
pub enum VrtError {
    #[error("{0} and {1} are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),
    #[error("invalid clipper: {0}")]
    InvalidClipper(String),
    #[error("missing document field: {0}")]
    MissingField(String),
    #[error("malformed document field: {0}")]
    Malformed(String),
    #[error("geotransform has zero resolution")]
    ZeroResolution,
    #[error("unknown coordinate reference system EPSG:{0}")]
    UnknownCrs(u32),
    #[error("SRS service failure: {0}")]
    Service(String),
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VrtError {
    /// True for errors caused by the arguments of a transform call rather
    /// than by the document itself or a collaborator.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            VrtError::MutuallyExclusive(_, _) | VrtError::InvalidClipper(_)
        )
    }
}
