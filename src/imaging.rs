//! Placeholder rendering and layer preview resizing.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::debug;

/// Largest layer preview handed to callers; larger images are downsized.
pub const LAYER_PREVIEW_MAX: (u32, u32) = (800, 480);

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0x3a, 0x3f, 0x47, 0xff]);
const PLACEHOLDER_BORDER: Rgba<u8> = Rgba([0x5c, 0x63, 0x6e, 0xff]);

/// Image operations the adapter delegates to.
pub trait ImageHelper: Send + Sync {
    /// Render a stand-in image of exactly `width`×`height` pixels.
    fn generate_placeholder(&self, width: u32, height: u32) -> Bytes;

    /// Prepare a raw layer PNG for display.
    fn resize_layer_2d(&self, bytes: Bytes) -> Bytes;
}

/// PNG-based [`ImageHelper`] using the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultImageHelper;

impl ImageHelper for DefaultImageHelper {
    fn generate_placeholder(&self, width: u32, height: u32) -> Bytes {
        let (width, height) = (width.max(1), height.max(1));
        let image = RgbaImage::from_fn(width, height, |x, y| {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                PLACEHOLDER_BORDER
            } else {
                PLACEHOLDER_FILL
            }
        });
        encode_png(&image).unwrap_or_default()
    }

    fn resize_layer_2d(&self, bytes: Bytes) -> Bytes {
        let decoded = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                debug!(error = %e, "layer image did not decode, passing through");
                return bytes;
            }
        };
        let (max_w, max_h) = LAYER_PREVIEW_MAX;
        if decoded.width() <= max_w && decoded.height() <= max_h {
            return bytes;
        }
        let resized = decoded.resize(max_w, max_h, FilterType::Triangle).to_rgba8();
        encode_png(&resized).unwrap_or(bytes)
    }
}

fn encode_png(image: &RgbaImage) -> Option<Bytes> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).ok()?;
    Some(Bytes::from(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;

    use super::*;

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn placeholder_has_requested_size() {
        let png = DefaultImageHelper.generate_placeholder(800, 480);
        assert_eq!(dimensions(&png), (800, 480));
    }

    #[test]
    fn placeholder_is_deterministic() {
        let a = DefaultImageHelper.generate_placeholder(400, 400);
        let b = DefaultImageHelper.generate_placeholder(400, 400);
        assert_eq!(a, b);
    }

    #[test]
    fn large_layer_is_downsized() {
        let big = DefaultImageHelper.generate_placeholder(1920, 1080);
        let small = DefaultImageHelper.resize_layer_2d(big);
        let (w, h) = dimensions(&small);
        assert!(w <= 800 && h <= 480, "got {w}x{h}");
    }

    #[test]
    fn small_layer_passes_through() {
        let png = DefaultImageHelper.generate_placeholder(100, 60);
        assert_eq!(DefaultImageHelper.resize_layer_2d(png.clone()), png);
    }

    #[test]
    fn undecodable_bytes_pass_through() {
        let junk = Bytes::from_static(b"not a png");
        assert_eq!(DefaultImageHelper.resize_layer_2d(junk.clone()), junk);
    }
}
