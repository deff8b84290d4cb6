use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MAX_DIMENSION: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThumbnailFormat {
    #[default]
    Jpeg,
    Webp,
}

impl ThumbnailFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpeg",
            ThumbnailFormat::Webp => "webp",
        }
    }

    /// File extension used for thumbnails on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpg",
            ThumbnailFormat::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "image/jpeg",
            ThumbnailFormat::Webp => "image/webp",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            ThumbnailFormat::Jpeg => image::ImageFormat::Jpeg,
            ThumbnailFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

impl FromStr for ThumbnailFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ThumbnailFormat::Jpeg),
            "webp" => Ok(ThumbnailFormat::Webp),
            other => Err(format!("unknown thumbnail format '{}'", other)),
        }
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What an upload does when the thumbnail cannot be derived from the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailFailurePolicy {
    /// The upload succeeds and the thumbnail error is reported alongside it.
    #[default]
    Lenient,
    /// The flags are committed, then the whole request fails.
    Strict,
}

impl FromStr for ThumbnailFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(ThumbnailFailurePolicy::Lenient),
            "strict" => Ok(ThumbnailFailurePolicy::Strict),
            other => Err(format!("unknown thumbnail failure policy '{}'", other)),
        }
    }
}

/// Dimensions of a freshly written thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ThumbnailInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thumbnail task failed: {0}")]
    Task(String),
}

pub type ThumbnailResult<T> = Result<T, ThumbnailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_format_parsing() {
        assert_eq!("jpeg".parse::<ThumbnailFormat>(), Ok(ThumbnailFormat::Jpeg));
        assert_eq!("JPG".parse::<ThumbnailFormat>(), Ok(ThumbnailFormat::Jpeg));
        assert_eq!("webp".parse::<ThumbnailFormat>(), Ok(ThumbnailFormat::Webp));
        assert!("gif".parse::<ThumbnailFormat>().is_err());
    }

    #[test]
    fn test_thumbnail_format_extension_and_content_type() {
        assert_eq!(ThumbnailFormat::Jpeg.extension(), "jpg");
        assert_eq!(ThumbnailFormat::Webp.extension(), "webp");
        assert_eq!(ThumbnailFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ThumbnailFormat::Webp.content_type(), "image/webp");
        assert_eq!(format!("{}", ThumbnailFormat::Webp), "webp");
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!(
            "lenient".parse::<ThumbnailFailurePolicy>(),
            Ok(ThumbnailFailurePolicy::Lenient)
        );
        assert_eq!(
            "Strict".parse::<ThumbnailFailurePolicy>(),
            Ok(ThumbnailFailurePolicy::Strict)
        );
        assert!("sometimes".parse::<ThumbnailFailurePolicy>().is_err());
        assert_eq!(
            ThumbnailFailurePolicy::default(),
            ThumbnailFailurePolicy::Lenient
        );
    }
}
