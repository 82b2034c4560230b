//! Downscale-and-recompress transform for student photos.
//!
//! The store only has a few kilobytes per key, so every photo is shrunk to
//! fit a small square and re-encoded as low-quality JPEG before it is put on
//! a record. The result is a `data:` URL that can be embedded as-is.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::{breaks, proceeds, Error, Payload};

pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoSettings {
    /// Longest side of the output, in pixels.
    pub max_side: u32,
    /// JPEG quality on the 1..=100 scale.
    pub quality: u8,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            max_side: 100,
            quality: 30,
        }
    }
}

/// Target size keeping the aspect ratio, with the longer side clamped to
/// `max_side`. Fractions are truncated and neither side drops below 1.
pub fn scaled_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let scale = |side: u32, longer: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(max_side) / u64::from(longer.max(1));
        u32::try_from(scaled).unwrap_or(max_side).max(1)
    };

    if width > height && width > max_side {
        (max_side, scale(height, width))
    } else if height > max_side {
        (scale(width, height), max_side)
    } else {
        (width.max(1), height.max(1))
    }
}

/// Drops alpha by compositing onto black, so transparent areas come out
/// dark instead of whatever colour sits under them.
fn flatten_on_black(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let blend = |channel: u8| ((u16::from(channel) * u16::from(a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Decodes any supported raster format and returns the compact encoding.
pub fn compress(bytes: &[u8], settings: &PhotoSettings) -> Payload<String> {
    let source = image::load_from_memory(bytes)?;
    let (width, height) = scaled_dimensions(source.width(), source.height(), settings.max_side);
    let resized = flatten_on_black(&source.resize_exact(width, height, FilterType::Triangle));

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, settings.quality.clamp(1, 100))
        .encode_image(&resized)?;

    log::debug!(
        "compressed {}x{} photo ({} bytes) to {}x{} ({} bytes)",
        source.width(),
        source.height(),
        bytes.len(),
        width,
        height,
        jpeg.len()
    );
    proceeds(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(jpeg)))
}

/// Compresses every file on the blocking pool. The output keeps submission
/// order whatever order the tasks finish in; one failure fails the batch.
pub async fn compress_all(files: Vec<Vec<u8>>, settings: PhotoSettings) -> Payload<Vec<String>> {
    let mut tasks = JoinSet::new();
    for (index, bytes) in files.into_iter().enumerate() {
        tasks.spawn_blocking(move || (index, compress(&bytes, &settings)));
    }

    let mut slots: Vec<Option<String>> = vec![None; tasks.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, encoded) = joined?;
        let encoded = encoded?;
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(encoded);
        }
    }

    let total = slots.len();
    let encodings: Vec<String> = slots.into_iter().flatten().collect();
    if encodings.len() != total {
        return breaks(Error::InternalError {
            kind: "PhotoPipeline",
            message: format!("{} of {} photos produced no output", total - encodings.len(), total),
        });
    }
    proceeds(encodings)
}

/// Strips the data URL wrapper and returns the JPEG bytes.
pub fn decode_data_url(encoded: &str) -> Payload<Vec<u8>> {
    let Some(body) = encoded.strip_prefix(DATA_URL_PREFIX) else {
        return breaks(Error::validation("photo is not a JPEG data URL"));
    };
    proceeds(STANDARD.decode(body)?)
}

/// Width and height of an encoded photo.
pub fn encoded_dimensions(encoded: &str) -> Payload<(u32, u32)> {
    let bytes = decode_data_url(encoded)?;
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    proceeds(reader.into_dimensions()?)
}
