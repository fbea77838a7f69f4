// ============================================================
// Layer 6 — Adapter Checkpoint
// ============================================================
// Reads a LoRA fine-tuning checkpoint.
//
// A checkpoint is a single .safetensors file:
//
//   tensors:
//     lora_state_dict.<peft key>   ← adapter weights (required)
//     ...
//   header metadata (optional):
//     "config" → the training configuration as JSON, e.g.
//        { "advanced": { "lora": { "r": 8, "alpha": 16,
//                                  "target_modules": ["q_proj", "v_proj"],
//                                  "dropout": 0.1, "bias": "none" } } }
//
// The `lora_state_dict` namespace is mandatory: a file without any
// tensor under it is rejected with CheckpointError::MissingAdapterWeights.
//
// The configuration is optional at every level. Each LoRA field
// that is missing falls back to its default; a config entry that
// is not valid JSON is ignored with a warning and all defaults apply.
//
// Reference: safetensors format specification
//            Hugging Face PEFT state-dict naming

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::infra::weights::{HostTensor, SafetensorsFile};
use crate::ml::lora::LoraConfig;

/// Tensor namespace holding the adapter weights.
pub const ADAPTER_WEIGHTS_KEY: &str = "lora_state_dict";

/// Header metadata entry holding the training configuration.
pub const CONFIG_METADATA_KEY: &str = "config";

/// Errors that identify a checkpoint as unusable.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The file has no tensor under the `lora_state_dict` namespace.
    #[error("Checkpoint '{}' does not contain LoRA state dict ('lora_state_dict')", .0.display())]
    MissingAdapterWeights(PathBuf),

    /// Strict loading was requested and some adapter keys did not line up.
    #[error("Adapter weights do not match the model: {0}")]
    AdapterMismatch(String),
}

// ─── Training configuration (metadata) ────────────────────────────────────────
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrainingConfig {
    advanced: AdvancedSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdvancedSection {
    lora: LoraConfig,
}

// ─── AdapterCheckpoint ────────────────────────────────────────────────────────
/// Adapter weights plus the LoRA configuration they were trained with.
#[derive(Debug)]
pub struct AdapterCheckpoint {
    /// Where the checkpoint was read from
    pub path: PathBuf,

    /// PEFT keys (namespace stripped) and their tensors
    pub weights: Vec<(String, HostTensor)>,

    /// Reconstructed adapter hyperparameters
    pub lora: LoraConfig,
}

impl AdapterCheckpoint {
    /// Read the checkpoint at `path`.
    ///
    /// Fails with [`CheckpointError::MissingAdapterWeights`] when the
    /// adapter namespace is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = SafetensorsFile::open(&path)?;

        let prefix = format!("{ADAPTER_WEIGHTS_KEY}.");
        let mut names: Vec<String> = file
            .names()?
            .into_iter()
            .filter(|n| n.starts_with(&prefix))
            .collect();
        if names.is_empty() {
            return Err(CheckpointError::MissingAdapterWeights(path).into());
        }
        names.sort();

        let mut weights = Vec::with_capacity(names.len());
        for name in names {
            if let Some(tensor) = file.read(&name)? {
                weights.push((name[prefix.len()..].to_string(), tensor));
            }
        }

        let lora = read_lora_config(&file)?;
        tracing::info!(
            "Adapter checkpoint '{}': {} tensors, r={}, alpha={}, targets={:?}, bias={:?}",
            path.display(),
            weights.len(),
            lora.r,
            lora.alpha,
            lora.target_modules,
            lora.bias,
        );

        Ok(Self { path, weights, lora })
    }
}

/// Reconstruct the LoRA configuration from the header metadata.
fn read_lora_config(file: &SafetensorsFile) -> Result<LoraConfig> {
    let metadata = file.metadata()?;
    let Some(json) = metadata.get(CONFIG_METADATA_KEY) else {
        tracing::debug!("No training config in checkpoint, using LoRA defaults");
        return Ok(LoraConfig::default());
    };

    match serde_json::from_str::<TrainingConfig>(json) {
        Ok(cfg) => Ok(cfg.advanced.lora),
        Err(e) => {
            tracing::warn!("Ignoring unreadable training config in checkpoint: {e}");
            Ok(LoraConfig::default())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for writing adapter checkpoints in tests.

    use std::{collections::HashMap, path::Path};

    use super::{ADAPTER_WEIGHTS_KEY, CONFIG_METADATA_KEY};
    use crate::infra::weights::{testing::write_f32, HostTensor};

    /// Write `weights` under the adapter namespace with an optional config.
    pub fn write_adapter(path: &Path, weights: &[(&str, HostTensor)], config: Option<&str>) {
        let tensors: Vec<(String, HostTensor)> = weights
            .iter()
            .map(|(k, t)| (format!("{ADAPTER_WEIGHTS_KEY}.{k}"), t.clone()))
            .collect();
        let metadata = config.map(|c| {
            HashMap::from([(CONFIG_METADATA_KEY.to_string(), c.to_string())])
        });
        write_f32(path, &tensors, metadata);
    }
}
