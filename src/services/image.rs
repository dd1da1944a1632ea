use crate::config::ImageConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::MediaKind;
use crate::services::storage;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Every stored image uses this format, whatever was uploaded.
pub const CANONICAL_EXTENSION: &str = "webp";

pub struct TranscodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ImageTranscoder {
    max_width: u32,
    secondary_width: u32,
    quality: u8,
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new(&ImageConfig::default())
    }
}

impl ImageTranscoder {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            max_width: config.max_width,
            secondary_width: config.secondary_width,
            quality: config.quality,
        }
    }

    /// Width to scale down to, or `None` when the image can stay as is.
    pub fn target_width(&self, width: u32) -> Option<u32> {
        if width > self.max_width {
            Some(self.max_width)
        } else if width > self.secondary_width {
            Some(self.secondary_width)
        } else {
            None
        }
    }

    pub fn transcode(&self, data: &[u8]) -> PipelineResult<TranscodedImage> {
        let img = decode_oriented(data)
            .map_err(|e| PipelineError::TranscodeFailed(format!("could not decode image: {}", e)))?;
        let (orig_width, orig_height) = img.dimensions();

        let resized = match self.target_width(orig_width) {
            Some(width) => {
                let ratio = width as f64 / orig_width as f64;
                let height = ((orig_height as f64 * ratio).round() as u32).max(1);
                img.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
            }
            None => img,
        };

        let (width, height) = resized.dimensions();
        let data = encode_webp(&resized, self.quality)?;

        Ok(TranscodedImage {
            data,
            width,
            height,
        })
    }

    /// Transcodes `data` and writes it under `upload_root`, returning the
    /// stored path of the new file.
    pub fn transcode_to_file(&self, data: &[u8], upload_root: &Path) -> PipelineResult<String> {
        let transcoded = self.transcode(data)?;

        let stored_path =
            storage::new_stored_path(MediaKind::Image.storage_dir(), CANONICAL_EXTENSION);
        let file_path = storage::resolve(upload_root, &stored_path)?;
        storage::ensure_parent(&file_path)?;
        std::fs::write(&file_path, &transcoded.data)?;

        tracing::debug!(
            "Stored image {} ({}x{}, {} bytes)",
            stored_path,
            transcoded.width,
            transcoded.height,
            transcoded.data.len()
        );
        Ok(stored_path)
    }
}

/// Decodes an image and applies its EXIF orientation, so dropping the
/// metadata on re-encode does not leave the picture rotated.
fn decode_oriented(data: &[u8]) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Lossy WebP from raw pixels. Nothing but pixel data reaches the encoder, so
/// EXIF, ICC and XMP chunks from the source never make it into the output.
fn encode_webp(img: &DynamicImage, quality: u8) -> PipelineResult<Vec<u8>> {
    let (width, height) = img.dimensions();
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, quality as f32)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality as f32)
    };
    let memory = encoded.map_err(|e| {
        PipelineError::TranscodeFailed(format!("webp encoding failed: {:?}", e))
    })?;
    Ok(memory.to_vec())
}
