use image::{imageops::FilterType, RgbImage};

use super::tensor::{InputSpec, ModelInput, TensorLayout};

/// Resize to the model input (bilinear), scale to [0, 1] and lay out as a
/// batch of one in the model's channel order.
pub fn prepare_input(image: &RgbImage, spec: InputSpec) -> ModelInput {
    let resized = if image.dimensions() == (spec.width, spec.height) {
        image.clone()
    } else {
        image::imageops::resize(image, spec.width, spec.height, FilterType::Triangle)
    };

    let w = spec.width as usize;
    let h = spec.height as usize;
    let mut data = vec![0.0f32; w * h * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for channel in 0..3 {
            let idx = match spec.layout {
                TensorLayout::Nhwc => (y * w + x) * 3 + channel,
                TensorLayout::Nchw => channel * w * h + y * w + x,
            };
            data[idx] = pixel[channel] as f32 / 255.0;
        }
    }

    ModelInput { spec, data }
}
