use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use log::debug;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::blob_store::write_atomic;
use crate::thumbnail_types::{
    ThumbnailError, ThumbnailFormat, ThumbnailInfo, ThumbnailResult, DEFAULT_MAX_DIMENSION,
};

/// Computes the "max" fit of `(width, height)` inside a square of `max_dimension`.
/// Images already inside the bound keep their size; nothing is ever upscaled.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |side: u32, long_side: u32| -> u32 {
        let scaled = (side as f64 * max_dimension as f64 / long_side as f64).round() as u32;
        scaled.clamp(1, max_dimension)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    max_dimension: u32,
    format: ThumbnailFormat,
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION, ThumbnailFormat::default())
    }
}

impl ThumbnailGenerator {
    pub fn new(max_dimension: u32, format: ThumbnailFormat) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            format,
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn format(&self) -> ThumbnailFormat {
        self.format
    }

    /// Reads the image at `source`, bounds it to the configured dimension and
    /// writes the encoded result to `dest`, replacing any previous thumbnail.
    pub async fn generate(&self, source: &Path, dest: &Path) -> ThumbnailResult<ThumbnailInfo> {
        let source_path: PathBuf = source.to_path_buf();
        let max_dimension = self.max_dimension;
        let format = self.format;

        let (data, info) =
            tokio::task::spawn_blocking(move || render(&source_path, max_dimension, format))
                .await
                .map_err(|e| ThumbnailError::Task(e.to_string()))??;

        write_atomic(dest, &data).await?;

        debug!(
            "Wrote {}x{} {} thumbnail to {:?}",
            info.width, info.height, format, dest
        );

        Ok(info)
    }
}

fn render(
    source: &Path,
    max_dimension: u32,
    format: ThumbnailFormat,
) -> ThumbnailResult<(Vec<u8>, ThumbnailInfo)> {
    let img = open_oriented(source)?;
    let (width, height) = fit_within(img.width(), img.height(), max_dimension);

    let thumbnail = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    let data = encode_image(thumbnail, format)?;
    Ok((data, ThumbnailInfo { width, height }))
}

/// Decodes an image and applies the orientation recorded in its metadata.
fn open_oriented(path: &Path) -> ThumbnailResult<DynamicImage> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn encode_image(img: DynamicImage, format: ThumbnailFormat) -> ThumbnailResult<Vec<u8>> {
    // JPEG has no alpha channel and the WebP encoder only takes 8-bit buffers
    let img = match format {
        ThumbnailFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        ThumbnailFormat::Webp if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        ThumbnailFormat::Webp => DynamicImage::ImageRgb8(img.to_rgb8()),
    };

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format.image_format())?;
    Ok(buffer.into_inner())
}
