//! Canonical image preprocessing for the feature extractor.
//!
//! decode → RGB8 → resize shortest edge → center crop → scale to `[0, 1]` →
//! per-channel ImageNet normalization → CHW `f32` tensor.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array3;

use crate::error::{CapError, Result};

/// ImageNet channel means (RGB).
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB).
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Open and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| CapError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Resize so the shortest edge equals `resize`, center-crop to `crop`×`crop`, and
/// normalize into a `(3, crop, crop)` tensor.
pub fn preprocess(image: &DynamicImage, resize: u32, crop: u32) -> Array3<f32> {
    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();

    // Never resize below the crop window.
    let short_edge = resize.max(crop);
    let scale = short_edge as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32) * scale).round().max(short_edge as f32) as u32;
    let new_h = ((h as f32) * scale).round().max(short_edge as f32) as u32;
    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let start_x = (new_w - crop) / 2;
    let start_y = (new_h - crop) / 2;
    let cropped = imageops::crop_imm(&resized, start_x, start_y, crop, crop).to_image();

    let size = crop as usize;
    let mut tensor = Array3::<f32>::zeros((3, size, size));
    for (x, y, pixel) in cropped.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[c, y as usize, x as usize]] = (value - MEAN[c]) / STD[c];
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Write;

    #[test]
    fn output_has_crop_shape_for_non_square_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = preprocess(&img, 256, 224);
        assert_eq!(tensor.shape(), &[3, 224, 224]);
    }

    #[test]
    fn solid_color_is_normalized_per_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 400, Rgb([255, 0, 128])));
        let tensor = preprocess(&img, 256, 224);

        let expected = [
            (1.0 - MEAN[0]) / STD[0],
            (0.0 - MEAN[1]) / STD[1],
            (128.0 / 255.0 - MEAN[2]) / STD[2],
        ];
        for c in 0..3 {
            for &(y, x) in &[(0, 0), (111, 57), (223, 223)] {
                // one 8-bit step after resampling is ~0.018 in normalized units
                assert!(
                    (tensor[[c, y, x]] - expected[c]).abs() < 0.02,
                    "channel {c} at ({y}, {x}) was {}",
                    tensor[[c, y, x]]
                );
            }
        }
    }

    #[test]
    fn tiny_images_are_upscaled_to_crop() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(10, 30));
        let tensor = preprocess(&img, 16, 32);
        assert_eq!(tensor.shape(), &[3, 32, 32]);
    }

    #[test]
    fn load_image_reports_decode_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a png").unwrap();

        let err = load_image(file.path()).unwrap_err();
        assert!(matches!(err, CapError::Decode { .. }));
        assert!(err.to_string().contains("failed to decode image"));
    }

    #[test]
    fn load_image_reports_missing_file_as_decode_error() {
        let err = load_image(Path::new("/nonexistent/cap.jpg")).unwrap_err();
        assert!(matches!(err, CapError::Decode { .. }));
    }

    #[test]
    fn load_image_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.png");
        RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])).save(&path).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.width(), 8);
    }
}
