use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

use crate::geometry::FrameScale;
use crate::vision::VisionError;

/// Per-frame failure. Never fatal to a session.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("vision: {0}")]
    Vision(#[from] VisionError),
}

/// Decode one encoded image (JPEG, PNG, …) into RGB8.
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::Empty);
    }
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Shrink a frame for detection. A unit scale returns a copy.
pub fn downscale(frame: &RgbImage, scale: FrameScale) -> RgbImage {
    let (width, height) = scale.scaled_dimensions(frame.width(), frame.height());
    if (width, height) == frame.dimensions() {
        return frame.clone();
    }
    imageops::resize(frame, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 40]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_png() {
        let frame = decode_frame(&png_bytes(16, 8)).unwrap();
        assert_eq!(frame.dimensions(), (16, 8));
        assert_eq!(frame.get_pixel(3, 3), &Rgb([120, 80, 40]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_frame(b"definitely not an image"),
            Err(FrameError::Decode(_))
        ));
        assert!(matches!(decode_frame(&[]), Err(FrameError::Empty)));
    }

    #[test]
    fn test_downscale_dimensions() {
        let frame = RgbImage::new(1280, 720);
        let small = downscale(&frame, FrameScale::new(0.25).unwrap());
        assert_eq!(small.dimensions(), (320, 180));

        let same = downscale(&frame, FrameScale::new(1.0).unwrap());
        assert_eq!(same.dimensions(), (1280, 720));
    }
}
