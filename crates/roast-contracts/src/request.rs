use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// A `data:<mime>;base64,<payload>` string, as browser file readers produce.
    DataUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub source: ImageSource,
    pub mime_type: String,
    pub name: String,
}

impl ImagePayload {
    pub fn new(source: ImageSource, mime_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source,
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::new(ImageSource::Bytes(bytes), mime_type, "upload")
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoastRequest {
    pub image: ImagePayload,
    /// Free text, passed through verbatim. Not validated as a URL.
    pub url: Option<String>,
}

impl RoastRequest {
    pub fn new(image: ImagePayload, url: Option<String>) -> Self {
        Self { image, url }
    }

    /// Only an empty string counts as absent; whitespace is kept as given.
    pub fn url_context(&self) -> Option<&str> {
        self.url.as_deref().filter(|value| !value.is_empty())
    }
}
