use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageReader;
use roast_contracts::request::{ImagePayload, ImageSource};
use roast_contracts::RoastError;

/// Transport-ready image: standard base64 of the raw bytes plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

pub fn encode_image(payload: &ImagePayload) -> Result<EncodedImage, RoastError> {
    let (data, prefix_mime) = match &payload.source {
        ImageSource::Bytes(bytes) => {
            ensure_not_empty(bytes.len(), &payload.name)?;
            (BASE64.encode(bytes), None)
        }
        ImageSource::Path(path) => {
            let bytes = fs::read(path).map_err(|err| {
                RoastError::encoding(format!("failed reading {}: {err}", path.display()))
            })?;
            ensure_not_empty(bytes.len(), &path.display().to_string())?;
            (BASE64.encode(bytes), None)
        }
        ImageSource::DataUrl(raw) => {
            let data = strip_data_url_prefix(raw).trim();
            let decoded = BASE64.decode(data.as_bytes()).map_err(|err| {
                RoastError::encoding(format!("image data is not valid base64: {err}"))
            })?;
            ensure_not_empty(decoded.len(), &payload.name)?;
            (data.to_string(), data_url_mime(raw))
        }
    };

    let mime_type = Some(payload.mime_type.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or(prefix_mime)
        .unwrap_or_else(|| "image/png".to_string());
    Ok(EncodedImage { mime_type, data })
}

/// Drops a `data:<mime>;base64,` prefix. Other input comes back unchanged.
pub fn strip_data_url_prefix(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with("data:") {
        return raw;
    }
    match trimmed.split_once(',') {
        Some((_, payload)) => payload,
        None => raw,
    }
}

fn data_url_mime(raw: &str) -> Option<String> {
    let header = raw.trim_start().strip_prefix("data:")?.split(',').next()?;
    let mime = header.split(';').next()?.trim();
    if mime.is_empty() {
        None
    } else {
        Some(mime.to_string())
    }
}

fn ensure_not_empty(len: usize, label: &str) -> Result<(), RoastError> {
    if len == 0 {
        return Err(RoastError::encoding(format!("{label} is empty")));
    }
    Ok(())
}

/// Builds a payload for a file on disk, detecting its MIME type.
///
/// The header is sniffed first; the extension is only a fallback. The
/// result may well be a non-image, which the session rejects.
pub fn image_payload_from_path(path: &Path) -> Result<ImagePayload, RoastError> {
    if !path.is_file() {
        return Err(RoastError::encoding(format!(
            "{} is not a readable file",
            path.display()
        )));
    }
    let mime_type = sniff_image_mime(path)
        .map(str::to_string)
        .unwrap_or_else(|| guess_mime_from_extension(path).to_string());
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(ImagePayload::new(
        ImageSource::Path(path.to_path_buf()),
        mime_type,
        name,
    ))
}

fn sniff_image_mime(path: &Path) -> Option<&'static str> {
    let reader = ImageReader::open(path).ok()?.with_guessed_format().ok()?;
    reader.format().map(|format| format.to_mime_type())
}

pub fn guess_mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use base64::Engine as _;
    use roast_contracts::request::{ImagePayload, ImageSource};
    use roast_contracts::RoastErrorKind;

    use super::{
        encode_image, guess_mime_from_extension, image_payload_from_path, strip_data_url_prefix,
        BASE64,
    };

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[test]
    fn encoding_round_trips_arbitrary_bytes() -> anyhow::Result<()> {
        let bytes: Vec<u8> = (0..=255u8).chain([0, 0, 255]).collect();
        let encoded = encode_image(&ImagePayload::from_bytes(bytes.clone(), "image/png"))?;
        assert_eq!(BASE64.decode(encoded.data.as_bytes())?, bytes);
        assert_eq!(encoded.mime_type, "image/png");
        Ok(())
    }

    #[test]
    fn data_url_prefix_is_stripped() -> anyhow::Result<()> {
        let payload = ImagePayload::new(
            ImageSource::DataUrl("data:image/jpeg;base64,aGVsbG8=".to_string()),
            "",
            "shot.jpg",
        );
        let encoded = encode_image(&payload)?;
        assert_eq!(encoded.data, "aGVsbG8=");
        assert_eq!(encoded.mime_type, "image/jpeg");
        assert_eq!(encoded.data_url(), "data:image/jpeg;base64,aGVsbG8=");

        assert_eq!(strip_data_url_prefix("aGVsbG8="), "aGVsbG8=");
        assert_eq!(strip_data_url_prefix("data:image/png;base64,AAAA"), "AAAA");
        Ok(())
    }

    #[test]
    fn payload_mime_wins_over_data_url_prefix() -> anyhow::Result<()> {
        let payload = ImagePayload::new(
            ImageSource::DataUrl("data:image/png;base64,aGVsbG8=".to_string()),
            "image/webp",
            "shot.webp",
        );
        let encoded = encode_image(&payload)?;
        assert_eq!(encoded.mime_type, "image/webp");
        assert_eq!(encoded.data, "aGVsbG8=");
        Ok(())
    }

    #[test]
    fn corrupt_data_url_is_an_encoding_error() {
        let payload = ImagePayload::new(
            ImageSource::DataUrl("data:image/png;base64,@@not-base64@@".to_string()),
            "image/png",
            "shot.png",
        );
        let err = encode_image(&payload).unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Encoding);
    }

    #[test]
    fn unreadable_path_is_an_encoding_error() {
        let payload = ImagePayload::new(
            ImageSource::Path(PathBuf::from("/definitely/not/here.png")),
            "image/png",
            "here.png",
        );
        let err = encode_image(&payload).unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Encoding);
        assert!(err.message().contains("failed reading"));
    }

    #[test]
    fn empty_image_is_an_encoding_error() {
        let err = encode_image(&ImagePayload::from_bytes(Vec::new(), "image/png")).unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Encoding);
    }

    #[test]
    fn path_payload_sniffs_header_before_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        // PNG bytes behind a misleading extension.
        let disguised = temp.path().join("screenshot.pdf");
        fs::write(&disguised, PNG_HEADER)?;
        let payload = image_payload_from_path(&disguised)?;
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.name, "screenshot.pdf");
        assert!(payload.is_image());

        let pdf = temp.path().join("deck.pdf");
        fs::write(&pdf, b"%PDF-1.7 not an image")?;
        let payload = image_payload_from_path(&pdf)?;
        assert_eq!(payload.mime_type, "application/pdf");
        assert!(!payload.is_image());

        let encoded = encode_image(&image_payload_from_path(&disguised)?)?;
        assert_eq!(BASE64.decode(encoded.data.as_bytes())?, PNG_HEADER);
        Ok(())
    }

    #[test]
    fn missing_file_cannot_be_selected() {
        let err = image_payload_from_path(std::path::Path::new("/nope/missing.png")).unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Encoding);
    }

    #[test]
    fn extension_fallback_table() {
        assert_eq!(
            guess_mime_from_extension(std::path::Path::new("a.JPEG")),
            "image/jpeg"
        );
        assert_eq!(
            guess_mime_from_extension(std::path::Path::new("a.txt")),
            "application/octet-stream"
        );
    }
}
