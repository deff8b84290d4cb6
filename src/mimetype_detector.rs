use std::path::Path;

/// Served when neither the bytes nor the file name reveal the type. Uploads
/// are stored as `.jpg`, so this matches what clients expect.
pub const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Detects the MIME type from the leading bytes of an image.
pub fn from_bytes(data: &[u8]) -> Option<MimeType> {
    let format = image::guess_format(data).ok()?;
    MimeType::parse(format.to_mime_type())
}

/// Detects MIME type based on file extension
pub fn from_path(path: &Path) -> Option<MimeType> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(from_extension)
}

/// Content type for serving a stored file: sniffed bytes first, then the
/// extension, then the JPEG fallback.
pub fn content_type_for(data: &[u8], path: &Path) -> String {
    from_bytes(data)
        .or_else(|| from_path(path))
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

fn from_extension(ext: &str) -> Option<MimeType> {
    let ext_lower = ext.to_lowercase();
    match ext_lower.as_str() {
        "jpg" | "jpeg" => Some(MimeType::new("image", "jpeg")),
        "png" => Some(MimeType::new("image", "png")),
        "gif" => Some(MimeType::new("image", "gif")),
        "webp" => Some(MimeType::new("image", "webp")),
        "bmp" => Some(MimeType::new("image", "bmp")),
        "tiff" | "tif" => Some(MimeType::new("image", "tiff")),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    type_: String,
    subtype: String,
}

impl MimeType {
    fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
        }
    }

    fn parse(mime: &str) -> Option<Self> {
        let (type_, subtype) = mime.split_once('/')?;
        Some(Self::new(type_, subtype))
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut buffer, format)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_sniffs_common_formats() {
        assert_eq!(
            from_bytes(&encoded(ImageFormat::Jpeg)).unwrap().to_string(),
            "image/jpeg"
        );
        assert_eq!(
            from_bytes(&encoded(ImageFormat::Png)).unwrap().to_string(),
            "image/png"
        );
        assert_eq!(
            from_bytes(&encoded(ImageFormat::Bmp)),
            Some(MimeType::new("image", "bmp"))
        );
    }

    #[test]
    fn test_bytes_win_over_extension() {
        let png = encoded(ImageFormat::Png);

        assert_eq!(
            content_type_for(&png, &PathBuf::from("photo.jpg")),
            "image/png"
        );
    }

    #[test]
    fn test_unknown_bytes_fall_back() {
        assert_eq!(
            content_type_for(b"plain text", &PathBuf::from("photo.webp")),
            "image/webp"
        );
        assert_eq!(
            content_type_for(b"plain text", &PathBuf::from("photo")),
            FALLBACK_CONTENT_TYPE
        );
        assert!(from_bytes(&[]).is_none());
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(
            from_path(&PathBuf::from("photo.JPG")).unwrap().to_string(),
            "image/jpeg"
        );
        assert!(from_path(&PathBuf::from("clip.mp4")).is_none());
    }
}
