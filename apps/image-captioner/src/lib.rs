use ai::{
    blip::{Blip, BlipFiles, GenerationConfig},
    device::select_device,
    Model,
};
use anyhow::anyhow;
use file_downloader::{FileDownload, FileDownloadConfig, ModelSource};
use std::path::PathBuf;
use tracing::info;

pub const MODEL_REPO_ID: &str = "Salesforce/blip-image-captioning-large";
/// The safetensors conversion of the checkpoint lives on this branch.
pub const MODEL_REVISION: &str = "refs/pr/18";

/// Everything the captioner needs to know. The binary only ever uses `Default`.
#[derive(Debug, Clone)]
pub struct CaptionConfig {
    pub image_path: PathBuf,
    pub model_source: ModelSource,
    pub model_file: String,
    pub tokenizer_file: String,
    pub preprocessor_config_file: String,
    pub generation: GenerationConfig,
    pub download: FileDownloadConfig,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from("panda.jpeg"),
            model_source: ModelSource::new(MODEL_REPO_ID, MODEL_REVISION),
            model_file: "model.safetensors".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            preprocessor_config_file: "preprocessor_config.json".to_string(),
            generation: GenerationConfig::default(),
            download: FileDownloadConfig::default(),
        }
    }
}

/// Caption the configured image.
///
/// The image is read before anything is downloaded, so a missing file fails
/// without touching the network.
#[tracing::instrument(name = "run", err(Debug), skip_all, fields(image = %config.image_path.display()))]
pub async fn run(config: CaptionConfig) -> anyhow::Result<String> {
    let image = Blip::load_image(&config.image_path).await?;

    let download = FileDownload::new(config.download);
    let [model_path, tokenizer_path, preprocessor_config_path]: [PathBuf; 3] = download
        .fetch_model(
            &config.model_source,
            &[
                config.model_file.as_str(),
                config.tokenizer_file.as_str(),
                config.preprocessor_config_file.as_str(),
            ],
        )
        .await?
        .try_into()
        .map_err(|_| anyhow!("unexpected number of model artifacts"))?;

    let files = BlipFiles {
        model_path,
        tokenizer_path,
        preprocessor_config_path,
    };

    let device = select_device();
    let mut blip = Blip::new(&files, config.generation, device).await?;
    info!("model {} loaded", config.model_source.repo_id);

    blip.process(image).await
}
