use std::path::Path;
use std::time::Instant;

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;
use tracing::debug;

use super::{GenerationParams, InferenceEngine, ModelError};

const EOS_TOKENS: &[&str] = &["</s>", "<|endoftext|>", "<|end|>", "<|eot_id|>", "<|im_end|>"];

/// Prompt tokens beyond this window are dropped from the front.
const MAX_CONTEXT: usize = 4096;

/// Quantized llama-family model running on the CPU.
pub(crate) struct CandleEngine {
    model: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos: Vec<u32>,
}

impl CandleEngine {
    pub(crate) fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self, ModelError> {
        if !tokenizer_path.exists() {
            return Err(ModelError::ArtifactMissing(tokenizer_path.to_path_buf()));
        }
        let device = Device::Cpu;
        let mut file = std::fs::File::open(model_path)
            .map_err(|e| ModelError::Load(format!("{}: {e}", model_path.display())))?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| ModelError::Load(format!("invalid gguf file: {e}")))?;
        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| ModelError::Load(e.to_string()))?;
        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        let eos: Vec<u32> = EOS_TOKENS
            .iter()
            .filter_map(|token| tokenizer.token_to_id(token))
            .collect();
        debug!(eos = ?eos, "tokenizer loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            eos,
        })
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ModelError> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))
    }
}

impl InferenceEngine for CandleEngine {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        let mut tokens = encoding.get_ids().to_vec();
        let budget = MAX_CONTEXT.saturating_sub(params.max_tokens).max(1);
        if tokens.len() > budget {
            tokens.drain(..tokens.len() - budget);
        }

        let temperature = (params.temperature > 0.0).then_some(params.temperature);
        let mut sampler = LogitsProcessor::new(params.seed, temperature, Some(params.top_p));
        let mut generated: Vec<u32> = Vec::with_capacity(params.max_tokens);
        let mut input = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        // Position 0 resets the KV cache left over from the previous call.
        let mut position = 0;

        for _ in 0..params.max_tokens {
            let logits = self.model.forward(&input, position)?.squeeze(0)?;
            position += input.dim(1)?;
            let next = sampler.sample(&logits)?;
            if self.eos.contains(&next) {
                break;
            }
            generated.push(next);

            let text = self.decode(&generated)?;
            let text = text.trim_start();
            if params
                .stop
                .iter()
                .any(|stop| !stop.is_empty() && text.contains(stop.as_str()))
            {
                break;
            }
            if params.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                debug!(tokens = generated.len(), "generation deadline reached");
                break;
            }
            input = Tensor::new(&[next], &self.device)?.unsqueeze(0)?;
        }

        self.decode(&generated)
    }
}
