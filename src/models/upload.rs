use serde::{Deserialize, Serialize};

/// An image submitted for plate recognition, as received from a camera
/// capture or an HTTP upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    pub filename: String,
    /// Declared MIME type (e.g. `image/jpeg`).
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
