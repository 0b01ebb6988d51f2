//! Captured frames and their encoding for the recognition service.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fmt;

/// JPEG quality used for frames sent to the recognition service.
pub const JPEG_QUALITY: u8 = 80;

/// Share of near-black pixels above which a frame counts as dark.
pub const DARK_THRESHOLD_PCT: f32 = 0.95;

/// A captured still frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub is_dark: bool,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("is_dark", &self.is_dark)
            .finish_non_exhaustive()
    }
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        let luma = image::imageops::grayscale(&image);
        let is_dark = is_dark_frame(luma.as_raw(), DARK_THRESHOLD_PCT);
        Self { image, is_dark }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Average luma (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        let luma = image::imageops::grayscale(&self.image);
        let data = luma.as_raw();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|&b| b as f32).sum::<f32>() / data.len() as f32
    }

    /// Encode as JPEG at [`JPEG_QUALITY`].
    pub fn encode_jpeg(&self) -> Result<EncodedImage, FrameError> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
            .encode_image(&self.image)?;
        Ok(EncodedImage {
            mime: "image/jpeg".to_string(),
            bytes,
        })
    }
}

/// Check if a frame is dark: more than `threshold_pct` of pixels below 32.
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

/// Encoded image bytes together with their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`, the form the service accepts.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&vec![0u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        assert!(!is_dark_frame(&vec![128u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_dark_frame_borderline_bright() {
        // 94% dark, 6% bright → not dark
        let mut gray = vec![10u8; 940];
        gray.extend(vec![128u8; 60]);
        assert!(!is_dark_frame(&gray, 0.95));
    }

    #[test]
    fn test_frame_flags_dark_image() {
        let frame = Frame::new(RgbImage::from_pixel(8, 8, Rgb([2, 2, 2])));
        assert!(frame.is_dark);
        assert!(frame.avg_brightness() < 5.0);
    }

    #[test]
    fn test_encode_jpeg_data_url() {
        let frame = Frame::new(RgbImage::from_pixel(16, 12, Rgb([200, 150, 100])));
        assert!(!frame.is_dark);
        let encoded = frame.encode_jpeg().unwrap();
        // JPEG SOI marker
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);

        let url = encoded.to_data_url();
        let payload = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), encoded.bytes);
    }

    #[test]
    fn test_debug_omits_pixels() {
        let frame = Frame::new(RgbImage::from_pixel(4, 3, Rgb([9, 9, 9])));
        let shown = format!("{frame:?}");
        assert!(shown.contains("width: 4"), "{shown}");
        assert!(shown.contains("is_dark: true"), "{shown}");
        assert!(!shown.contains("image"), "{shown}");
    }
}
