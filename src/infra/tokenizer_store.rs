// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the Hugging Face tokenizer that ships with the base model
// and answers the few questions generation needs from it: which
// ids end a sequence.
//
// In tests the base model is not available, so `build_word_level`
// writes a tiny word-level tokenizer JSON and loads it back — the
// same trick used to avoid the trainer API in tokenizers 0.15.
//
// Reference: tokenizers crate documentation

use anyhow::Result;
use std::path::PathBuf;
use tokenizers::Tokenizer;

/// Tokens that end a sequence for Qwen-family tokenizers.
const EOS_TOKENS: [&str; 2] = ["<|endoftext|>", "<|im_end|>"];

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tokenizer JSON file.
    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer = Tokenizer::from_file(&self.path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", self.path.display(), e
            ))?;
        tracing::debug!(
            "Tokenizer loaded from '{}' ({} tokens)",
            self.path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }
}

/// Ids of the end-of-sequence tokens known to `tokenizer`.
pub fn eos_token_ids(tokenizer: &Tokenizer) -> Vec<u32> {
    EOS_TOKENS
        .iter()
        .filter_map(|t| tokenizer.token_to_id(t))
        .collect()
}

/// Write a word-level tokenizer over `words` into `dir` and load it.
///
/// Ids: 0 `<|endoftext|>` (special), 1 `[UNK]`, then `words` in order.
#[cfg(test)]
pub fn build_word_level(dir: &std::path::Path, words: &[&str]) -> Result<Tokenizer> {
    use anyhow::Context;

    let mut vocab = serde_json::json!({
        "<|endoftext|>": 0,
        "[UNK]": 1,
    });
    for (i, word) in words.iter().enumerate() {
        vocab[*word] = serde_json::json!(i + 2);
    }

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "<|endoftext|>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": { "type": "WhitespaceSplit" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    });

    let path = dir.join("tokenizer.json");
    std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
        .with_context(|| "Cannot write tokenizer JSON")?;
    TokenizerStore::new(path).load()
}
