use std::path::PathBuf;

/// A repository on the model registry, pinned to a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub repo_id: String,
    pub revision: String,
}

impl ModelSource {
    pub fn new(repo_id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: revision.into(),
        }
    }

    /// Registry path of `file`, relative to the registry url.
    pub fn uri(&self, file: &str) -> String {
        format!(
            "{}/resolve/{}/{}",
            self.repo_id,
            self.revision.replace('/', "%2F"),
            file
        )
    }

    /// Where `file` lives inside the resources dir.
    pub fn local_path(&self, file: &str) -> PathBuf {
        PathBuf::from(&self.repo_id)
            .join(self.revision.replace('/', "--"))
            .join(file)
    }
}
