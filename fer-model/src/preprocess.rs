use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;
use thiserror::Error;

/// FER2013 images are 48x48 grayscale.
pub const INPUT_SIZE: usize = 48;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("expected {expected} pixel values, got {found}")]
    PixelCount { expected: usize, found: usize },

    #[error("invalid pixel value {0:?}")]
    PixelValue(String),

    #[error("tensor shape error: {0}")]
    Shape(String),
}

/// Classifier input `[1, 1, 48, 48]` from a face crop.
pub fn face_tensor(face: &DynamicImage) -> Array4<f32> {
    let size = INPUT_SIZE as u32;
    let gray = face
        .resize_exact(size, size, FilterType::Triangle)
        .to_luma8();
    let data: Vec<f32> = gray.as_raw().iter().map(|&p| p as f32 / 255.0).collect();
    Array4::from_shape_fn((1, 1, INPUT_SIZE, INPUT_SIZE), |(_, _, y, x)| {
        data[y * INPUT_SIZE + x]
    })
}

/// Classifier input from the space-separated `pixels` column of the FER2013 CSV.
pub fn pixels_tensor(pixels: &str) -> Result<Array4<f32>, PreprocessError> {
    let values = pixels
        .split_whitespace()
        .map(|tok| {
            tok.parse::<u8>()
                .map(|v| v as f32 / 255.0)
                .map_err(|_| PreprocessError::PixelValue(tok.to_string()))
        })
        .collect::<Result<Vec<f32>, _>>()?;

    let expected = INPUT_SIZE * INPUT_SIZE;
    if values.len() != expected {
        return Err(PreprocessError::PixelCount {
            expected,
            found: values.len(),
        });
    }
    Array4::from_shape_vec((1, 1, INPUT_SIZE, INPUT_SIZE), values)
        .map_err(|e| PreprocessError::Shape(e.to_string()))
}
