//! Local text generation.
//!
//! [`ModelAdapter`] owns the engine: it loads it at most once, serializes
//! generation through a mutex and runs every call on the blocking pool under
//! a timeout. Callers that only need text go through [`TextGenerator`].

#[cfg(feature = "candle")]
mod candle;
mod fetch;
mod mock;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

pub use fetch::{HubSource, fetch_missing};
pub use mock::respond as mock_response;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found at {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[cfg(feature = "candle")]
    #[error("inference failed: {0}")]
    Inference(#[from] candle_core::Error),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("no inference engine compiled in (enable the `candle` feature)")]
    EngineDisabled,

    #[error("model is not loaded")]
    NotLoaded,

    #[error("generation worker failed: {0}")]
    Worker(String),

    #[error("model lock poisoned")]
    LockPoisoned,

    #[error("artifact download failed: {0}")]
    Fetch(String),
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String, ModelError>;

    fn is_loaded(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_tokens: usize,
    /// `<= 0` selects greedy decoding.
    pub temperature: f64,
    pub top_p: f64,
    pub seed: u64,
    pub stop: Vec<String>,
    /// Engines stop early once this instant has passed.
    pub deadline: Option<Instant>,
}

/// A loaded model. Generation needs `&mut self` because engines keep a KV
/// cache between tokens.
pub trait InferenceEngine: Send {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError>;
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub top_p: f64,
    pub seed: u64,
    pub stop: Vec<String>,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/model.gguf"),
            tokenizer_path: PathBuf::from("./models/tokenizer.json"),
            top_p: 0.95,
            seed: 299_792_458,
            stop: vec!["User:".into(), "\n\n".into()],
            timeout: Duration::from_secs(120),
        }
    }
}

type SharedEngine = Arc<Mutex<Box<dyn InferenceEngine>>>;
type Loader = Arc<dyn Fn() -> Result<Box<dyn InferenceEngine>, ModelError> + Send + Sync>;

pub struct ModelAdapter {
    config: ModelConfig,
    loader: Loader,
    engine: OnceCell<Option<SharedEngine>>,
}

impl ModelAdapter {
    /// Adapter that loads the engine selected by the enabled cargo features.
    pub fn new(config: ModelConfig) -> Self {
        let load_config = config.clone();
        Self::with_loader(config, move || load_engine(&load_config))
    }

    /// Adapter with a custom engine loader.
    pub fn with_loader<F>(config: ModelConfig, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn InferenceEngine>, ModelError> + Send + Sync + 'static,
    {
        Self {
            config,
            loader: Arc::new(loader),
            engine: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Loads the engine if no attempt has been made yet. Returns whether an
    /// engine is available. A failed attempt is not retried.
    pub async fn initialize(&self) -> bool {
        self.engine().await.is_some()
    }

    async fn engine(&self) -> Option<&SharedEngine> {
        self.engine
            .get_or_init(|| async {
                let loader = Arc::clone(&self.loader);
                let started = Instant::now();
                match tokio::task::spawn_blocking(move || loader()).await {
                    Ok(Ok(engine)) => {
                        info!(
                            path = %self.config.model_path.display(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "model loaded"
                        );
                        Some(Arc::new(Mutex::new(engine)))
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "model unavailable, serving mock responses");
                        None
                    }
                    Err(e) => {
                        error!(error = %e, "model loader panicked");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

fn load_engine(config: &ModelConfig) -> Result<Box<dyn InferenceEngine>, ModelError> {
    if !config.model_path.exists() {
        return Err(ModelError::ArtifactMissing(config.model_path.clone()));
    }
    #[cfg(feature = "candle")]
    {
        let engine = candle::CandleEngine::load(&config.model_path, &config.tokenizer_path)?;
        Ok(Box::new(engine))
    }
    #[cfg(not(feature = "candle"))]
    {
        Err(ModelError::EngineDisabled)
    }
}

/// Cuts `text` at the first stop sequence and trims it.
fn truncate_at_stop(text: &str, stop: &[String]) -> String {
    let text = text.trim_start();
    let end = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    text[..end].trim().to_owned()
}

#[async_trait]
impl TextGenerator for ModelAdapter {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String, ModelError> {
        let engine = self.engine().await.cloned().ok_or(ModelError::NotLoaded)?;
        let timeout = self.config.timeout;
        let params = GenerationParams {
            max_tokens,
            temperature,
            top_p: self.config.top_p,
            seed: self.config.seed,
            stop: self.config.stop.clone(),
            deadline: Some(Instant::now() + timeout),
        };
        let prompt = prompt.to_owned();
        let task = tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().map_err(|_| ModelError::LockPoisoned)?;
            engine.generate(&prompt, &params)
        });
        let raw = match tokio::time::timeout(timeout, task).await {
            Err(_) => return Err(ModelError::Timeout(timeout)),
            Ok(joined) => joined.map_err(|e| ModelError::Worker(e.to_string()))??,
        };
        Ok(truncate_at_stop(&raw, &self.config.stop))
    }

    fn is_loaded(&self) -> bool {
        matches!(self.engine.get(), Some(Some(_)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        answer: &'static str,
        delay: Duration,
    }

    impl InferenceEngine for Scripted {
        fn generate(&mut self, _prompt: &str, _params: &GenerationParams) -> Result<String, ModelError> {
            std::thread::sleep(self.delay);
            Ok(self.answer.to_owned())
        }
    }

    fn scripted(answer: &'static str, delay: Duration, config: ModelConfig) -> ModelAdapter {
        ModelAdapter::with_loader(config, move || {
            Ok(Box::new(Scripted { answer, delay }) as Box<dyn InferenceEngine>)
        })
    }

    #[tokio::test]
    async fn concurrent_initialization_runs_loader_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let adapter = Arc::new(ModelAdapter::with_loader(ModelConfig::default(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Box::new(Scripted {
                answer: "ok",
                delay: Duration::ZERO,
            }) as Box<dyn InferenceEngine>)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let adapter = Arc::clone(&adapter);
                tokio::spawn(async move { adapter.initialize().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(adapter.is_loaded());
    }

    #[tokio::test]
    async fn missing_artifact_leaves_model_unloaded() {
        let adapter = ModelAdapter::new(ModelConfig {
            model_path: PathBuf::from("/nonexistent/model.gguf"),
            ..ModelConfig::default()
        });
        assert!(!adapter.initialize().await);
        assert!(!adapter.is_loaded());
        let err = adapter.generate("hi", 8, 0.7).await.unwrap_err();
        assert!(matches!(err, ModelError::NotLoaded));
    }

    #[tokio::test]
    async fn output_is_cut_at_stop_sequence() {
        let adapter = scripted(
            "\n Sure, use a list.\nUser: and more?",
            Duration::ZERO,
            ModelConfig::default(),
        );
        let text = adapter.generate("prompt", 16, 0.7).await.unwrap();
        assert_eq!(text, "Sure, use a list.");
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let adapter = scripted(
            "late",
            Duration::from_millis(300),
            ModelConfig {
                timeout: Duration::from_millis(20),
                ..ModelConfig::default()
            },
        );
        let err = adapter.generate("prompt", 16, 0.7).await.unwrap_err();
        assert!(matches!(err, ModelError::Timeout(_)));
    }

    #[test]
    fn truncation_picks_earliest_stop() {
        let stop = vec!["User:".to_owned(), "\n\n".to_owned()];
        assert_eq!(truncate_at_stop("a\n\nb User:", &stop), "a");
        assert_eq!(truncate_at_stop("plain", &stop), "plain");
    }
}
