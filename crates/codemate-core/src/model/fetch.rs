use std::path::PathBuf;

use super::{ModelConfig, ModelError};

/// Hugging Face hub coordinates of the model artifacts.
#[derive(Debug, Clone)]
pub struct HubSource {
    pub model_repo: String,
    pub model_file: String,
    pub tokenizer_repo: String,
}

impl Default for HubSource {
    fn default() -> Self {
        Self {
            model_repo: "microsoft/Phi-3-mini-4k-instruct-gguf".into(),
            model_file: "Phi-3-mini-4k-instruct-q4.gguf".into(),
            tokenizer_repo: "microsoft/Phi-3-mini-4k-instruct".into(),
        }
    }
}

struct Wanted {
    repo: String,
    file: String,
    target: PathBuf,
}

/// Downloads whichever of the model and tokenizer files are missing on disk.
///
/// Returns the paths that were written; an empty list means both artifacts
/// were already present.
pub async fn fetch_missing(
    config: &ModelConfig,
    source: &HubSource,
) -> Result<Vec<PathBuf>, ModelError> {
    let mut wanted = Vec::new();
    if !config.model_path.exists() {
        wanted.push(Wanted {
            repo: source.model_repo.clone(),
            file: source.model_file.clone(),
            target: config.model_path.clone(),
        });
    }
    if !config.tokenizer_path.exists() {
        wanted.push(Wanted {
            repo: source.tokenizer_repo.clone(),
            file: "tokenizer.json".into(),
            target: config.tokenizer_path.clone(),
        });
    }
    if wanted.is_empty() {
        return Ok(Vec::new());
    }
    tokio::task::spawn_blocking(move || download(wanted))
        .await
        .map_err(|e| ModelError::Worker(format!("spawn_blocking panicked: {e}")))?
}

#[cfg(feature = "candle")]
fn download(wanted: Vec<Wanted>) -> Result<Vec<PathBuf>, ModelError> {
    use hf_hub::api::sync::Api;
    use tracing::info;

    let api = Api::new().map_err(|e| ModelError::Fetch(format!("hf-hub init failed: {e}")))?;
    let mut written = Vec::with_capacity(wanted.len());
    for item in wanted {
        let cached = api
            .model(item.repo.clone())
            .get(&item.file)
            .map_err(|e| ModelError::Fetch(format!("{}/{}: {e}", item.repo, item.file)))?;
        if let Some(parent) = item.target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ModelError::Fetch(format!("{}: {e}", parent.display())))?;
        }
        std::fs::copy(&cached, &item.target)
            .map_err(|e| ModelError::Fetch(format!("{}: {e}", item.target.display())))?;
        info!(repo = %item.repo, file = %item.file, target = %item.target.display(), "artifact downloaded");
        written.push(item.target);
    }
    Ok(written)
}

#[cfg(not(feature = "candle"))]
fn download(wanted: Vec<Wanted>) -> Result<Vec<PathBuf>, ModelError> {
    for item in &wanted {
        tracing::warn!(
            repo = %item.repo,
            file = %item.file,
            target = %item.target.display(),
            "artifact missing and no downloader compiled in"
        );
    }
    Err(ModelError::EngineDisabled)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn present_artifacts_are_not_fetched() {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let config = ModelConfig {
            model_path: manifest.clone(),
            tokenizer_path: manifest,
            ..ModelConfig::default()
        };
        let written = fetch_missing(&config, &HubSource::default()).await.unwrap();
        assert!(written.is_empty());
    }

    #[cfg(not(feature = "candle"))]
    #[tokio::test]
    async fn missing_artifacts_need_the_downloader() {
        let config = ModelConfig {
            model_path: PathBuf::from("/nonexistent/model.gguf"),
            tokenizer_path: PathBuf::from("/nonexistent/tokenizer.json"),
            ..ModelConfig::default()
        };
        let err = fetch_missing(&config, &HubSource::default()).await.unwrap_err();
        assert!(matches!(err, ModelError::EngineDisabled));
    }
}
