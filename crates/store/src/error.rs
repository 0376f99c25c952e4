use scene::HotspotError;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    HotspotNotFound {
        viewpoint: String,
        hotspot: String,
    },
    ImageIndexOutOfRange {
        hotspot: String,
        index: usize,
        len: usize,
    },
    EmptyImage,
    DuplicateHotspot {
        viewpoint: String,
        hotspot: String,
    },
    InvalidHotspot(HotspotError),
    StorageUnavailable,
    Corrupt(String),
    Io(String),
    /// Transport failure or a non-success status from the remote API.
    Http(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::HotspotNotFound { viewpoint, hotspot } => {
                write!(f, "hotspot {hotspot} not found in viewpoint {viewpoint}")
            }
            StoreError::ImageIndexOutOfRange {
                hotspot,
                index,
                len,
            } => write!(
                f,
                "image index {index} out of range for hotspot {hotspot} ({len} images)"
            ),
            StoreError::EmptyImage => write!(f, "image reference must not be empty"),
            StoreError::DuplicateHotspot { viewpoint, hotspot } => {
                write!(f, "viewpoint {viewpoint} lists hotspot {hotspot} twice")
            }
            StoreError::InvalidHotspot(err) => write!(f, "invalid hotspot: {err}"),
            StoreError::StorageUnavailable => write!(f, "hotspot storage unavailable"),
            StoreError::Corrupt(msg) => write!(f, "hotspot data corrupt: {msg}"),
            StoreError::Io(msg) => write!(f, "hotspot storage error: {msg}"),
            StoreError::Http(msg) => write!(f, "hotspot api error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<HotspotError> for StoreError {
    fn from(err: HotspotError) -> Self {
        StoreError::InvalidHotspot(err)
    }
}
