// ============================================================
// Layer 2 — Application Configuration
// ============================================================
// Every setting the summarizer needs, in one serialisable struct.
//
// Sources, lowest priority first:
//   1. built-in defaults (Default impl below)
//   2. an optional JSON file given with --config
//   3. command line flags (applied by Layer 1)
//
// Missing keys in the JSON file keep their defaults, so a config
// file only needs the settings it changes:
//
//   { "device": "cpu", "generation": { "seed": 42 } }
//
// Reference: serde documentation (#[serde(default)])

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::example::ExampleRecord;
use crate::ml::{
    generator::GenerationConfig,
    worker::{ComputeDevice, ModelSpec},
};

/// Hugging Face id of the model the adapter was trained on.
pub const DEFAULT_BASE_MODEL: &str = "Qwen/Qwen3-0.6B-Base";

// ─── Application Configuration ───────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the example data
    pub data_dir:       PathBuf,
    /// Catalogue file name inside data_dir
    pub index_file:     String,
    /// Post text directory inside data_dir
    pub texts_dir:      String,
    /// Thumbnail directory inside data_dir
    pub thumbnails_dir: String,

    /// Local directory or Hugging Face Hub repository id
    pub base_model:     String,
    /// Adapter checkpoint (safetensors)
    pub checkpoint:     PathBuf,
    pub device:         ComputeDevice,
    /// Refuse to start when adapter keys do not line up
    pub strict_adapter: bool,
    pub generation:     GenerationConfig,

    /// Web front-end bind address
    pub host:           String,
    pub port:           u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from("data"),
            index_file:     "examples.json".to_string(),
            texts_dir:      "texts".to_string(),
            thumbnails_dir: "thumbnails".to_string(),
            base_model:     DEFAULT_BASE_MODEL.to_string(),
            checkpoint:     PathBuf::from("models/adapter.safetensors"),
            device:         ComputeDevice::default(),
            strict_adapter: false,
            generation:     GenerationConfig::default(),
            host:           "127.0.0.1".to_string(),
            port:           7860,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the JSON file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Malformed config file '{}'", path.display()))?;
        tracing::info!("Configuration loaded from '{}'", path.display());
        Ok(config)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    pub fn text_path(&self, record: &ExampleRecord) -> PathBuf {
        self.data_dir.join(&self.texts_dir).join(&record.text)
    }

    pub fn thumbnail_path(&self, record: &ExampleRecord) -> PathBuf {
        self.data_dir.join(&self.thumbnails_dir).join(&record.image)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            base_model:     self.base_model.clone(),
            checkpoint:     self.checkpoint.clone(),
            strict_adapter: self.strict_adapter,
            device:         self.device,
            generation:     self.generation.clone(),
        }
    }
}
