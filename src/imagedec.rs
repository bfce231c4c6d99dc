/// Decoded raster pixels for an embedded image: tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Seam for embedded-image decoding. The parse pass only routes bytes
/// through here; swap the implementation to change formats or to skip
/// pixel work entirely in headless runs.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Option<ImageData>;
}

/// Default decoder backed by the `image` crate (PNG and JPEG).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImageDecoder;

impl ImageDecoder for DefaultImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Option<ImageData> {
        let decoded = image::load_from_memory(bytes).ok()?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Some(ImageData {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decodes_png_dimensions_and_pixels() {
        let data = DefaultImageDecoder.decode(&tiny_png()).unwrap();
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.pixels.len(), 3 * 2 * 4);
        assert_eq!(&data.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_bytes_decode_to_none() {
        assert!(DefaultImageDecoder.decode(b"not an image").is_none());
    }
}
