mod generation;
mod preprocess;

pub use generation::*;
pub use preprocess::*;

use crate::device::working_dtype;
use crate::traits::{ImageCaptionInput, ImageCaptionOutput};
use crate::Model;
use anyhow::{anyhow, Context};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::blip;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::debug;

/// Local artifacts of one BLIP checkpoint.
#[derive(Debug, Clone)]
pub struct BlipFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub preprocessor_config_path: PathBuf,
}

pub struct Blip {
    tokenizer: Tokenizer,
    preprocessor: PreprocessorConfig,
    model: blip::BlipForConditionalGeneration,
    logits_processor: LogitsProcessor,
    generation: GenerationConfig,
    device: Device,
    dtype: DType,
}

impl Model for Blip {
    type Item = ImageCaptionInput;
    type Output = ImageCaptionOutput;

    async fn process(&mut self, item: Self::Item) -> anyhow::Result<Self::Output> {
        self.caption(&item)
    }
}

impl Blip {
    /// Load the `image_captioning_large` architecture onto `device`.
    ///
    /// Weights and inputs share the working precision of the device.
    pub async fn new(
        files: &BlipFiles,
        generation: GenerationConfig,
        device: Device,
    ) -> anyhow::Result<Self> {
        let tokenizer = Tokenizer::from_file(&files.tokenizer_path)
            .map_err(|e| anyhow!("failed to initialize tokenizer: {e}"))?;
        let preprocessor = PreprocessorConfig::from_file(&files.preprocessor_config_path).await?;

        // no temperature: greedy argmax decoding
        let logits_processor = LogitsProcessor::new(1337, None, None);

        let dtype = working_dtype(&device);
        debug!(
            "loading model {} as {:?}",
            files.model_path.display(),
            dtype
        );
        let config = blip::Config::image_captioning_large();
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.model_path.as_path()], dtype, &device)?
        };
        let model = blip::BlipForConditionalGeneration::new(&config, vb)
            .context("failed to build BLIP model")?;

        Ok(Self {
            tokenizer,
            preprocessor,
            model,
            logits_processor,
            generation,
            device,
            dtype,
        })
    }

    pub async fn load_image(image_path: impl AsRef<Path>) -> anyhow::Result<DynamicImage> {
        let image_path = image_path.as_ref();
        let data = tokio::fs::read(image_path)
            .await
            .with_context(|| format!("failed to read image {}", image_path.display()))?;
        image::load_from_memory(&data)
            .with_context(|| format!("failed to decode image {}", image_path.display()))
    }

    #[tracing::instrument(name = "Blip::caption", err(Debug), skip_all)]
    pub fn caption(&mut self, image: &DynamicImage) -> anyhow::Result<String> {
        let pixel_values = self
            .preprocessor
            .preprocess(image)?
            .to_device(&self.device)?
            .to_dtype(self.dtype)?;

        let model = &mut self.model;
        let logits_processor = &mut self.logits_processor;
        let device = &self.device;

        let image_embeds = model.vision_model().forward(&pixel_values.unsqueeze(0)?)?;

        // we need this to make multi time generation work
        model.text_decoder().reset_kv_cache();

        let token_ids = generate_tokens(&self.generation, |context| {
            let input_ids = Tensor::new(context, device)?.unsqueeze(0)?;
            let logits = model.text_decoder().forward(&input_ids, &image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?.to_dtype(DType::F32)?;
            Ok(logits_processor.sample(&logits)?)
        })?;
        debug!("generated {} tokens", token_ids.len());

        decode_caption(&self.tokenizer, &token_ids)
    }
}

/// Decode generated ids to text without special tokens or surrounding whitespace.
pub fn decode_caption(tokenizer: &Tokenizer, token_ids: &[u32]) -> anyhow::Result<String> {
    let text = tokenizer
        .decode(token_ids, true)
        .map_err(|e| anyhow!("failed to decode caption: {e}"))?;
    Ok(text.trim().to_string())
}
