use anyhow::{bail, Context};
use candle_core::{DType, Device, Tensor};
use image::{imageops::FilterType, DynamicImage};
use serde::Deserialize;
use std::path::Path;

/// Target size of the resized image.
///
/// Older checkpoints store a single integer for square images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ImageSize {
    Square(u32),
    Dims { height: u32, width: u32 },
}

impl ImageSize {
    pub fn height(&self) -> u32 {
        match *self {
            ImageSize::Square(v) => v,
            ImageSize::Dims { height, .. } => height,
        }
    }

    pub fn width(&self) -> u32 {
        match *self {
            ImageSize::Square(v) => v,
            ImageSize::Dims { width, .. } => width,
        }
    }
}

/// Mirrors `preprocessor_config.json` of a BLIP checkpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub do_resize: bool,
    pub size: ImageSize,
    pub do_rescale: bool,
    pub rescale_factor: f64,
    pub do_normalize: bool,
    pub image_mean: Vec<f32>,
    pub image_std: Vec<f32>,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: ImageSize::Square(384),
            do_rescale: true,
            rescale_factor: 1. / 255.,
            do_normalize: true,
            image_mean: vec![0.48145466, 0.4578275, 0.40821073],
            image_std: vec![0.26862954, 0.261_302_6, 0.275_777_1],
        }
    }
}

impl PreprocessorConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("invalid preprocessor config format")?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read preprocessor config {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.image_mean.len() != 3 || self.image_std.len() != 3 {
            bail!(
                "expected 3 channel mean and std, got {} and {}",
                self.image_mean.len(),
                self.image_std.len()
            );
        }
        if self.image_std.iter().any(|v| *v == 0.) {
            bail!("image std must not contain zero");
        }
        if self.size.height() == 0 || self.size.width() == 0 {
            bail!("image size must not be zero");
        }
        Ok(())
    }

    /// Convert an image into a normalized CHW `f32` tensor on the CPU.
    pub fn preprocess(&self, image: &DynamicImage) -> anyhow::Result<Tensor> {
        let image = if self.do_resize {
            image.resize_exact(
                self.size.width(),
                self.size.height(),
                FilterType::CatmullRom,
            )
        } else {
            image.clone()
        };
        let image = image.to_rgb8();
        let (width, height) = image.dimensions();

        let data = Tensor::from_vec(
            image.into_raw(),
            (height as usize, width as usize, 3),
            &Device::Cpu,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;

        let data = if self.do_rescale {
            data.affine(self.rescale_factor, 0.)?
        } else {
            data
        };

        if !self.do_normalize {
            return Ok(data);
        }

        let mean = Tensor::new(self.image_mean.as_slice(), &Device::Cpu)?.reshape((3, 1, 1))?;
        let std = Tensor::new(self.image_std.as_slice(), &Device::Cpu)?.reshape((3, 1, 1))?;
        Ok(data.broadcast_sub(&mean)?.broadcast_div(&std)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn parses_square_size_checkpoint_config() {
        let config = PreprocessorConfig::from_json(
            r#"{
                "do_normalize": true,
                "do_resize": true,
                "image_mean": [0.48145466, 0.4578275, 0.40821073],
                "image_processor_type": "BlipImageProcessor",
                "image_std": [0.26862954, 0.26130258, 0.27577711],
                "processor_class": "BlipProcessor",
                "size": 384
            }"#,
        )
        .unwrap();

        assert_eq!(config.size, ImageSize::Square(384));
        assert!(config.do_rescale);
        assert!((config.rescale_factor - 1. / 255.).abs() < 1e-12);
    }

    #[test]
    fn parses_height_width_size() {
        let config =
            PreprocessorConfig::from_json(r#"{"size": {"height": 224, "width": 256}}"#).unwrap();

        assert_eq!(config.size.height(), 224);
        assert_eq!(config.size.width(), 256);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let err = PreprocessorConfig::from_json(r#"{"image_std": [0.5, 0.5]}"#).unwrap_err();
        assert!(err.to_string().contains("3 channel"));
    }

    #[test]
    fn rejects_zero_std() {
        assert!(PreprocessorConfig::from_json(r#"{"image_std": [0.5, 0.0, 0.5]}"#).is_err());
    }

    #[test]
    fn resizes_to_target_chw() {
        let config = PreprocessorConfig::default();
        let tensor = config.preprocess(&solid_image(40, 25, [0, 0, 0])).unwrap();

        assert_eq!(tensor.dims(), &[3, 384, 384]);
        assert_eq!(tensor.dtype(), DType::F32);
    }

    #[test]
    fn normalizes_each_channel() {
        let config = PreprocessorConfig {
            size: ImageSize::Square(8),
            ..Default::default()
        };
        let tensor = config.preprocess(&solid_image(3, 3, [255, 0, 0])).unwrap();
        let values = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let plane = 8 * 8;

        let expected = [
            (1. - 0.48145466) / 0.26862954,
            (0. - 0.4578275) / 0.261_302_6,
            (0. - 0.40821073) / 0.275_777_1,
        ];
        for (channel, expected) in expected.iter().enumerate() {
            for v in &values[channel * plane..(channel + 1) * plane] {
                assert!((v - expected).abs() < 1e-4, "channel {channel}: {v} != {expected}");
            }
        }
    }

    #[test]
    fn skips_normalization_when_disabled() {
        let config = PreprocessorConfig {
            do_resize: false,
            do_normalize: false,
            ..Default::default()
        };
        let tensor = config.preprocess(&solid_image(2, 4, [51, 102, 255])).unwrap();

        assert_eq!(tensor.dims(), &[3, 4, 2]);
        let values = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!((values[0] - 0.2).abs() < 1e-6);
        assert!((values[8] - 0.4).abs() < 1e-6);
        assert!((values[16] - 1.0).abs() < 1e-6);
    }
}
