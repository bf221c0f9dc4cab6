use crate::ModelSource;
use anyhow::anyhow;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct FileDownloadConfig {
    pub url: String,
    pub resources_dir: std::path::PathBuf,
}

pub struct FileDownload {
    url: String,
    resources_dir: std::path::PathBuf,
}

impl Default for FileDownloadConfig {
    fn default() -> Self {
        let resources_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("image-captioner")
            .join("resources");
        Self {
            url: "https://huggingface.co".to_string(),
            resources_dir,
        }
    }
}

impl FileDownload {
    pub fn new(config: FileDownloadConfig) -> Self {
        Self {
            url: config.url,
            resources_dir: config.resources_dir,
        }
    }

    pub fn download_url(&self, uri: impl AsRef<std::path::Path>) -> anyhow::Result<String> {
        let uri = uri.as_ref();
        let uri = uri
            .to_str()
            .ok_or_else(|| anyhow!("invalid uri: {}", uri.display()))?;
        Ok(format!("{}/{}", self.url.trim_end_matches('/'), uri))
    }

    pub async fn download_to_path_if_not_exists(
        &self,
        uri: impl AsRef<std::path::Path>,
        file_path: impl AsRef<std::path::Path>,
    ) -> anyhow::Result<std::path::PathBuf> {
        let file_path = file_path.as_ref().to_path_buf();
        debug!("check file path: {:?}", file_path);
        if file_path.exists() {
            return Ok(file_path);
        }

        let temp_download_path = file_path.with_extension("temp");
        let download_url = self.download_url(uri)?;
        info!("downloading {}", download_url);

        let mut response = reqwest::get(&download_url).await?.error_for_status()?;

        // create parent folder
        if let Some(parent_dir) = file_path.parent() {
            fs::create_dir_all(parent_dir).await?;
        }

        let written = async {
            let mut file = File::create(&temp_download_path).await?;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = written {
            // a partial model file can be gigabytes
            if let Err(remove_err) = fs::remove_file(&temp_download_path).await {
                warn!("failed to remove {:?}: {}", temp_download_path, remove_err);
            }
            return Err(e.context(format!("failed to download {}", download_url)));
        }
        fs::rename(&temp_download_path, &file_path).await?;

        info!("file {:?} downloaded", file_path);

        Ok(file_path)
    }

    pub async fn download_if_not_exists(
        &self,
        uri: impl AsRef<std::path::Path>,
    ) -> anyhow::Result<std::path::PathBuf> {
        let file_path = self.resources_dir.join(&uri);
        self.download_to_path_if_not_exists(uri, file_path).await
    }

    /// Resolve one file of a registry repository to a local path.
    pub async fn fetch(
        &self,
        source: &ModelSource,
        file: &str,
    ) -> anyhow::Result<std::path::PathBuf> {
        let file_path = self.resources_dir.join(source.local_path(file));
        self.download_to_path_if_not_exists(source.uri(file), file_path)
            .await
    }

    /// Resolve several files of one repository, in the given order.
    pub async fn fetch_model(
        &self,
        source: &ModelSource,
        files: &[&str],
    ) -> anyhow::Result<Vec<std::path::PathBuf>> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(self.fetch(source, file).await?);
        }
        Ok(paths)
    }
}
