// ============================================================
// Layer 6 — Base Model Files
// ============================================================
// Locates the three things needed to rebuild the base model:
//
//   config.json       — architecture hyperparameters
//   tokenizer.json    — Hugging Face tokenizer definition
//   model.safetensors — weights, or several shards listed in
//                       model.safetensors.index.json
//
// The model can be given either as a local directory containing
// those files, or as a Hugging Face Hub repository id
// (e.g. "Qwen/Qwen3-0.6B-Base"), in which case hf-hub downloads
// them into its local cache on first use.
//
// Reference: hf-hub crate documentation (sync API)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE:      &str = "config.json";
const TOKENIZER_FILE:   &str = "tokenizer.json";
const WEIGHTS_FILE:     &str = "model.safetensors";
const WEIGHTS_INDEX:    &str = "model.safetensors.index.json";

/// Paths of a resolved base model.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config:    PathBuf,
    pub tokenizer: PathBuf,
    pub weights:   Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct WeightsIndex {
    weight_map: HashMap<String, String>,
}

/// Shard file names listed in a weights index, deduplicated and sorted.
fn shard_names(index_path: &Path) -> Result<Vec<String>> {
    let json = fs::read_to_string(index_path)
        .with_context(|| format!("Cannot read '{}'", index_path.display()))?;
    let index: WeightsIndex = serde_json::from_str(&json)
        .with_context(|| format!("Malformed weights index '{}'", index_path.display()))?;
    let shards: BTreeSet<String> = index.weight_map.into_values().collect();
    Ok(shards.into_iter().collect())
}

/// Resolve `model` (local directory or Hub repository id) to file paths.
pub fn resolve_model_files(model: &str) -> Result<ModelFiles> {
    let dir = Path::new(model);
    if dir.is_dir() {
        resolve_local(dir)
    } else {
        resolve_hub(model)
    }
}

fn resolve_local(dir: &Path) -> Result<ModelFiles> {
    tracing::info!("Using local base model at '{}'", dir.display());

    let single = dir.join(WEIGHTS_FILE);
    let weights = if single.exists() {
        vec![single]
    } else {
        shard_names(&dir.join(WEIGHTS_INDEX))?
            .into_iter()
            .map(|name| dir.join(name))
            .collect()
    };

    Ok(ModelFiles {
        config:    dir.join(CONFIG_FILE),
        tokenizer: dir.join(TOKENIZER_FILE),
        weights,
    })
}

fn resolve_hub(repo_id: &str) -> Result<ModelFiles> {
    tracing::info!("Fetching base model '{}' from the Hugging Face Hub", repo_id);

    let api  = hf_hub::api::sync::Api::new().context("Cannot initialise Hugging Face Hub client")?;
    let repo = api.model(repo_id.to_string());

    let fetch = |file: &str| -> Result<PathBuf> {
        repo.get(file)
            .with_context(|| format!("Cannot download '{file}' from '{repo_id}'"))
    };

    let config    = fetch(CONFIG_FILE)?;
    let tokenizer = fetch(TOKENIZER_FILE)?;
    let weights = match repo.get(WEIGHTS_FILE) {
        Ok(path) => vec![path],
        Err(single_err) => {
            tracing::debug!("No single weights file ({single_err}), trying sharded index");
            let index = fetch(WEIGHTS_INDEX)?;
            shard_names(&index)?
                .iter()
                .map(|name| fetch(name))
                .collect::<Result<Vec<_>>>()?
        }
    };

    Ok(ModelFiles { config, tokenizer, weights })
}
