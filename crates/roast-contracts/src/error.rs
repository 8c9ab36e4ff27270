use std::fmt;

pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Even our server rejected your site.";
pub const NOT_AN_IMAGE_MESSAGE: &str = "Images only. We can't roast a PDF.";
pub const EMPTY_REPLY_MESSAGE: &str = "AI refused to roast this. It might be too boring.";
pub const UNPARSEABLE_REPLY_MESSAGE: &str = "The roast was so intense it broke the parser.";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoastErrorKind {
    /// Submission without a selected image, or from a state that does not allow it.
    Precondition,
    /// The selected file is not an image; rejected before any pipeline run.
    NotAnImage,
    Encoding,
    Gateway,
    Parse,
}

impl RoastErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoastErrorKind::Precondition => "precondition",
            RoastErrorKind::NotAnImage => "not_an_image",
            RoastErrorKind::Encoding => "encoding",
            RoastErrorKind::Gateway => "gateway",
            RoastErrorKind::Parse => "parse",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoastError {
    kind: RoastErrorKind,
    message: String,
}

impl RoastError {
    pub fn new(kind: RoastErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(RoastErrorKind::Precondition, message)
    }

    pub fn not_an_image() -> Self {
        Self::new(RoastErrorKind::NotAnImage, NOT_AN_IMAGE_MESSAGE)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(RoastErrorKind::Encoding, message)
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        Self::new(RoastErrorKind::Gateway, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(RoastErrorKind::Parse, message)
    }

    pub fn kind(&self) -> RoastErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Text shown to the user when the lifecycle lands in the error state.
    pub fn user_message(&self) -> String {
        let trimmed = self.message.trim();
        if trimmed.is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl fmt::Display for RoastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.user_message())
    }
}

impl std::error::Error for RoastError {}
