//! PNG snapshot encoding
//!
//! Turns a 4-channel raw frame into an 8-bit RGB PNG. The primary path reads
//! the frame in place through a flat sample view; the fallback path copies the
//! channels into an RGB array first. Both are tried on every call.

use crate::capture::RawFrame;
use image::flat::{FlatSamples, SampleLayout};
use image::codecs::png::PngEncoder;
use image::{ColorType, GenericImageView, ImageEncoder, Rgb, RgbImage, Rgba};
use log::{debug, warn};

/// Which encoding path produced an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePath {
    /// In-place view of the raw buffer
    Primary,
    /// Channel reorder through an intermediate RGB copy
    Fallback,
}

/// A PNG ready to be written
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// PNG file contents
    pub bytes: Vec<u8>,

    pub width: u32,

    pub height: u32,

    /// Path that produced `bytes`
    pub path: EncodePath,
}

/// Failure of a single encoding path
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("pixel view rejected: {0}")]
    View(#[from] image::flat::Error),

    #[error("buffer holds {actual} bytes, {expected} needed")]
    ShortBuffer { expected: usize, actual: usize },

    #[error("could not build RGB image buffer")]
    Buffer,

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Both paths failed; carries the fallback's cause
#[derive(Debug, thiserror::Error)]
#[error("image encoding failed: {0}")]
pub struct EncodingError(#[from] pub PathError);

/// PNG encoder with a fallback path
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotEncoder;

impl SnapshotEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode a frame, falling back to the copying path if the primary fails
    pub fn encode(&self, frame: &RawFrame) -> Result<EncodedImage, EncodingError> {
        self.encode_with(frame, encode_direct)
    }

    fn encode_with<F>(&self, frame: &RawFrame, primary: F) -> Result<EncodedImage, EncodingError>
    where
        F: FnOnce(&RawFrame) -> Result<Vec<u8>, PathError>,
    {
        let (bytes, path) = match primary(frame) {
            Ok(bytes) => (bytes, EncodePath::Primary),
            Err(e) => {
                warn!("Primary encode failed for {}: {}, trying fallback", frame, e);
                (encode_reordered(frame)?, EncodePath::Fallback)
            }
        };

        debug!("Encoded {} into {} PNG bytes via {:?}", frame, bytes.len(), path);
        Ok(EncodedImage {
            bytes,
            width: frame.width,
            height: frame.height,
            path,
        })
    }
}

/// Read the frame through a flat view and build RGB pixels directly
fn encode_direct(frame: &RawFrame) -> Result<Vec<u8>, PathError> {
    let samples = FlatSamples {
        samples: frame.data.as_slice(),
        layout: SampleLayout::row_major_packed(4, frame.width, frame.height),
        color_hint: None,
    };
    let view = samples.as_view::<Rgba<u8>>()?;
    let [r, g, b] = frame.layout.rgb_offsets();

    let image = RgbImage::from_fn(frame.width, frame.height, |x, y| {
        let px = view.get_pixel(x, y).0;
        Rgb([px[r], px[g], px[b]])
    });
    write_png(&image)
}

/// Copy channels into RGB order, then build the image from that copy
fn encode_reordered(frame: &RawFrame) -> Result<Vec<u8>, PathError> {
    let expected = frame.expected_len();
    if frame.data.len() < expected {
        return Err(PathError::ShortBuffer {
            expected,
            actual: frame.data.len(),
        });
    }

    let [r, g, b] = frame.layout.rgb_offsets();
    let mut rgb = Vec::with_capacity(expected / 4 * 3);
    for px in frame.data[..expected].chunks_exact(4) {
        rgb.push(px[r]);
        rgb.push(px[g]);
        rgb.push(px[b]);
    }

    let image = RgbImage::from_raw(frame.width, frame.height, rgb).ok_or(PathError::Buffer)?;
    write_png(&image)
}

fn write_png(image: &RgbImage) -> Result<Vec<u8>, PathError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(png)
}
