// ============================================================
// Layer 5 — Summary Generator
// ============================================================
// Turns a SummaryRequest into a TL;DR:
//
//   request ─► prompt (data::prompt)
//           ─► token ids, truncated to max_input_tokens
//           ─► prefill: one forward pass over the whole prompt
//           ─► decode loop: sample a token, feed it back through
//              the KV cache, stop at end-of-sequence or after
//              max_new_tokens
//           ─► decode ONLY the new tokens, special tokens skipped
//
// Truncation keeps the beginning of the prompt; when the post is
// long enough to be cut, the "TL;DR:" marker is lost with it and
// the model continues the post instead of summarising. That is
// logged as a warning rather than hidden.
//
// Reference: Burn Book §3 (Building Blocks)
//            Hugging Face transformers `generate` semantics

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::TensorData};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokenizers::Tokenizer;

use crate::data::prompt::build_prompt;
use crate::domain::post::SummaryRequest;
use crate::infra::{
    checkpoint::AdapterCheckpoint,
    model_files::ModelFiles,
    tokenizer_store::{eos_token_ids, TokenizerStore},
    weights::WeightStore,
};
use crate::ml::{
    loader::{attach_checkpoint, load_base_model, load_config},
    model::{KvCache, Qwen3Config, Qwen3Model, RotaryTable},
    sampler::{Sampler, Sampling},
};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Decoding parameters; the defaults are the ones the adapter was tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Prompt tokens kept; the rest is dropped from the end
    pub max_input_tokens: usize,

    /// Upper bound on generated tokens
    pub max_new_tokens:   usize,

    pub temperature:      f32,
    pub top_p:            f32,

    /// `false` → greedy decoding
    pub do_sample:        bool,

    /// Fixed seed for reproducible sampling
    pub seed:             Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 1024,
            max_new_tokens:   200,
            temperature:      0.7,
            top_p:            0.9,
            do_sample:        true,
            seed:             None,
        }
    }
}

impl GenerationConfig {
    pub fn sampling(&self) -> Sampling {
        if self.do_sample {
            Sampling::TopP { temperature: self.temperature, top_p: self.top_p }
        } else {
            Sampling::Greedy
        }
    }
}

// ─── Generator ────────────────────────────────────────────────────────────────
/// Tokenizer plus fine-tuned model, ready to summarize.
pub struct Generator<B: Backend> {
    model:      Qwen3Model<B>,
    rope:       RotaryTable<B>,
    tokenizer:  Tokenizer,
    eos:        Vec<u32>,
    num_layers: usize,
    config:     GenerationConfig,
    device:     B::Device,
}

impl<B: Backend> Generator<B> {
    pub fn new(
        model:        Qwen3Model<B>,
        model_config: &Qwen3Config,
        tokenizer:    Tokenizer,
        config:       GenerationConfig,
        device:       B::Device,
    ) -> Self {
        let positions = (config.max_input_tokens + config.max_new_tokens)
            .min(model_config.max_position_embeddings)
            .max(1);
        let rope = RotaryTable::new(model_config.head_dim(), positions, model_config.rope_theta, &device);

        let mut eos = eos_token_ids(&tokenizer);
        if let Some(ids) = &model_config.eos_token_id {
            eos.extend(ids.ids());
        }
        eos.sort_unstable();
        eos.dedup();

        Self {
            model,
            rope,
            tokenizer,
            eos,
            num_layers: model_config.num_hidden_layers,
            config,
            device,
        }
    }

    /// Rebuild the fine-tuned model from the base model files and an
    /// adapter checkpoint.
    pub fn load(
        files:      &ModelFiles,
        checkpoint: &Path,
        strict:     bool,
        config:     GenerationConfig,
        device:     B::Device,
    ) -> Result<Self> {
        // The checkpoint is small and the likeliest to be wrong: read it first
        let checkpoint = AdapterCheckpoint::load(checkpoint)?;

        let tokenizer    = TokenizerStore::new(&files.tokenizer).load()?;
        let model_config = load_config(&files.config)?;
        let store        = WeightStore::open(&files.weights)?;

        let mut model = load_base_model::<B>(&model_config, &store, &device)?;
        drop(store);
        attach_checkpoint(&mut model, checkpoint, strict, &device)?;

        Ok(Self::new(model, &model_config, tokenizer, config, device))
    }

    pub fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        self.generate(&build_prompt(request))
    }

    /// Continue `prompt` and return only the continuation.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let encoding = self.tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow::anyhow!("Cannot tokenize prompt: {e}"))?;
        let prompt_ids = self.truncate(encoding.get_ids());
        anyhow::ensure!(!prompt_ids.is_empty(), "Prompt tokenized to nothing");

        let mut ids     = prompt_ids.clone();
        let mut cache   = KvCache::new(self.num_layers);
        let mut sampler = Sampler::new(self.config.sampling(), self.config.seed);
        let capacity    = self.rope.max_positions();

        let mut logits = self.model.forward_last(self.to_input(&prompt_ids), &self.rope, &mut cache);
        for _ in 0..self.config.max_new_tokens {
            let row = logits
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read logits: {e:?}"))?;
            let next = sampler.sample(&row);
            if self.eos.contains(&next) {
                break;
            }
            ids.push(next);
            if ids.len() >= capacity {
                tracing::debug!("Position table exhausted after {} tokens", ids.len());
                break;
            }
            logits = self.model.forward_last(self.to_input(&[next]), &self.rope, &mut cache);
        }

        tracing::debug!(
            "Generated {} tokens after a {}-token prompt",
            ids.len() - prompt_ids.len(),
            prompt_ids.len()
        );
        decode_continuation(&self.tokenizer, &ids, prompt_ids.len())
    }

    /// Keep the first `max_input_tokens` ids (and never more than the
    /// position table can hold alongside one generated token).
    fn truncate(&self, ids: &[u32]) -> Vec<u32> {
        let limit = self.config.max_input_tokens
            .min(self.rope.max_positions().saturating_sub(1))
            .max(1);
        if ids.len() > limit {
            tracing::warn!(
                "Prompt has {} tokens; truncating to the first {} (the summary marker is lost)",
                ids.len(),
                limit
            );
            ids[..limit].to_vec()
        } else {
            ids.to_vec()
        }
    }

    fn to_input(&self, ids: &[u32]) -> Tensor<B, 2, Int> {
        let data: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        Tensor::<B, 1, Int>::from_data(TensorData::new(data, [ids.len()]), &self.device)
            .reshape([1, ids.len()])
    }
}

/// Decode the tokens after `prompt_len`, skipping special tokens.
pub fn decode_continuation(tokenizer: &Tokenizer, ids: &[u32], prompt_len: usize) -> Result<String> {
    let new_ids = ids.get(prompt_len..).unwrap_or(&[]);
    let text = tokenizer
        .decode(new_ids, true)
        .map_err(|e| anyhow::anyhow!("Cannot decode generated tokens: {e}"))
        .context("Decoding summary")?;
    Ok(text.trim().to_string())
}
