use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::Array3;

use super::InferenceError;

/// Side length the network was trained on.
pub const IMAGE_SIZE: u32 = 512;
pub const CHANNELS: usize = 3;

/// Decodes `image`, squashes it to 512x512 RGB and lays it out channel-first
/// with values in `[0, 1]`.
pub fn preprocess(image: &[u8]) -> Result<Array3<f32>, InferenceError> {
    let decoded = image::load_from_memory(image)
        .map_err(|e| InferenceError::PreprocessingError(e.to_string()))?;
    let resized = resize_to_input(decoded.to_rgb8());
    Ok(to_chw(&resized))
}

pub fn resize_to_input(rgb: RgbImage) -> RgbImage {
    if rgb.dimensions() == (IMAGE_SIZE, IMAGE_SIZE) {
        return rgb;
    }
    imageops::resize(&rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
}

fn to_chw(rgb: &RgbImage) -> Array3<f32> {
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn(
        (CHANNELS, height as usize, width as usize),
        |(c, y, x)| f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn output_is_channel_first_and_unit_scaled() {
        let tensor = preprocess(&encode(gradient(64, 48), ImageFormat::Png)).unwrap();
        assert_eq!(tensor.shape(), &[3, 512, 512]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn same_bytes_give_the_same_tensor() {
        let bytes = encode(gradient(300, 200), ImageFormat::Png);
        assert_eq!(preprocess(&bytes).unwrap(), preprocess(&bytes).unwrap());
    }

    #[test]
    fn resizing_is_idempotent() {
        let resized = resize_to_input(gradient(300, 200).to_rgb8());
        let again = resize_to_input(resized.clone());
        assert_eq!(resized, again);

        let original = preprocess(&encode(gradient(300, 200), ImageFormat::Png)).unwrap();
        let reencoded =
            preprocess(&encode(DynamicImage::ImageRgb8(resized), ImageFormat::Png)).unwrap();
        assert_eq!(original, reencoded);
    }

    #[test]
    fn greyscale_and_alpha_inputs_become_three_channels() {
        let grey = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(10, 10, Luma([255u8])));
        let tensor = preprocess(&encode(grey, ImageFormat::Png)).unwrap();
        assert_eq!(tensor.shape(), &[3, 512, 512]);
        assert!(tensor.iter().all(|&v| v == 1.0));

        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(8, 8, Rgba([0u8, 51, 255, 0])));
        let tensor = preprocess(&encode(rgba, ImageFormat::Png)).unwrap();
        assert_eq!(tensor[[0, 0, 0]], 0.0);
        assert!((tensor[[1, 100, 100]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[2, 511, 511]], 1.0);
    }

    #[test]
    fn jpeg_is_accepted() {
        let tensor = preprocess(&encode(gradient(40, 40), ImageFormat::Jpeg)).unwrap();
        assert_eq!(tensor.shape(), &[3, 512, 512]);
    }

    #[test]
    fn garbage_bytes_fail_preprocessing() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InferenceError::PreprocessingError(_)));
    }
}
