use std::io::Cursor;

use cartograph_types::Size;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::CartographError;
use crate::render::engine::RawImage;

/// Encoding of rendered images.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG with an alpha channel.
    #[default]
    Png,
    /// JPEG with the given quality (1-100). The alpha channel is dropped.
    Jpeg {
        /// Encoder quality.
        quality: u8,
    },
}

impl OutputFormat {
    /// MIME type of the encoding.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }

    /// Usual file extension of the encoding.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// Turns the engine output into a bitmap of the requested size.
pub(crate) fn decode(raw: RawImage, size: Size<u32>) -> Result<RgbaImage, CartographError> {
    if raw.width() != size.width() || raw.height() != size.height() {
        return Err(CartographError::ImageEncodingFailed(format!(
            "engine produced a {}x{} image, {}x{} was requested",
            raw.width(),
            raw.height(),
            size.width(),
            size.height()
        )));
    }

    let length = raw.bytes().len();
    RgbaImage::from_raw(size.width(), size.height(), raw.into_bytes()).ok_or_else(|| {
        CartographError::ImageEncodingFailed(format!(
            "pixel buffer of {length} bytes does not hold a {}x{} RGBA image",
            size.width(),
            size.height()
        ))
    })
}

pub(crate) fn encode(bitmap: RgbaImage, format: OutputFormat) -> Result<Vec<u8>, CartographError> {
    let mut bytes = Cursor::new(Vec::new());
    match format {
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(bitmap).write_to(&mut bytes, ImageOutputFormat::Png)?
        }
        OutputFormat::Jpeg { quality } => {
            let rgb = DynamicImage::ImageRgba8(bitmap).to_rgb8();
            DynamicImage::ImageRgb8(rgb)
                .write_to(&mut bytes, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?
        }
    }

    Ok(bytes.into_inner())
}
