// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands: `web`, `tui`, `examples` and
// `summarize`, and the flags they share.
//
// Every command accepts the same model / data flags. They are
// applied on top of the optional --config JSON file, which is
// applied on top of the built-in defaults.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::AppConfig;
use crate::ml::worker::ComputeDevice;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the browser front-end
    Web(WebArgs),

    /// Run the full-screen terminal front-end
    Tui(SharedArgs),

    /// List the example catalogue
    Examples(SharedArgs),

    /// Print the summary of one example or text file
    Summarize(SummarizeArgs),
}

/// Flags every command understands.
#[derive(Args, Debug, Clone, Default)]
pub struct SharedArgs {
    /// JSON configuration file (missing keys keep their defaults)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding examples.json, texts/ and thumbnails/
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Base model: local directory or Hugging Face repository id
    #[arg(long)]
    pub base_model: Option<String>,

    /// Adapter checkpoint (safetensors with a lora_state_dict namespace)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Where the model runs: wgpu or cpu
    #[arg(long)]
    pub device: Option<ComputeDevice>,

    /// Fail instead of warning when adapter keys do not match the model
    #[arg(long)]
    pub strict_adapter: bool,

    /// Prompt tokens kept before generation
    #[arg(long)]
    pub max_input_tokens: Option<usize>,

    /// Maximum number of generated tokens
    #[arg(long)]
    pub max_new_tokens: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Greedy decoding instead of sampling
    #[arg(long)]
    pub greedy: bool,

    /// Seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SharedArgs {
    /// Defaults ← config file ← these flags.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut cfg = AppConfig::load(self.config.as_deref())?;

        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        if let Some(model) = &self.base_model {
            cfg.base_model = model.clone();
        }
        if let Some(path) = &self.checkpoint {
            cfg.checkpoint = path.clone();
        }
        if let Some(device) = self.device {
            cfg.device = device;
        }
        cfg.strict_adapter |= self.strict_adapter;

        let g = &mut cfg.generation;
        if let Some(n) = self.max_input_tokens { g.max_input_tokens = n; }
        if let Some(n) = self.max_new_tokens   { g.max_new_tokens = n; }
        if let Some(t) = self.temperature      { g.temperature = t; }
        if let Some(p) = self.top_p            { g.top_p = p; }
        if self.greedy                         { g.do_sample = false; }
        if self.seed.is_some()                 { g.seed = self.seed; }

        Ok(cfg)
    }
}

/// Arguments for the `web` command
#[derive(Args, Debug)]
pub struct WebArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Address to bind (default 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (default 7860)
    #[arg(long)]
    pub port: Option<u16>,

    /// Load the model before accepting requests
    #[arg(long)]
    pub warm_up: bool,
}

impl WebArgs {
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut cfg = self.shared.load_config()?;
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        Ok(cfg)
    }
}

/// Arguments for the `summarize` command
#[derive(Args, Debug)]
pub struct SummarizeArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Catalogue index of the example to summarize
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub example: Option<usize>,

    /// A post text file (TOPIC/TITLE/CONTENT labels optional)
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "reddit-summarizer", "examples",
            "--device", "cpu", "--greedy", "--seed", "9", "--max-new-tokens", "50",
        ])
        .unwrap();
        let Commands::Examples(args) = cli.command else { panic!("wrong command") };

        let cfg = args.load_config().unwrap();
        assert_eq!(cfg.device, ComputeDevice::Cpu);
        assert!(!cfg.generation.do_sample);
        assert_eq!(cfg.generation.seed, Some(9));
        assert_eq!(cfg.generation.max_new_tokens, 50);
        assert_eq!(cfg.generation.max_input_tokens, 1024);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"port": 9000, "base_model": "local/model"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "reddit-summarizer", "web", "--config", path.to_str().unwrap(), "--port", "8000",
        ])
        .unwrap();
        let Commands::Web(args) = cli.command else { panic!("wrong command") };

        let cfg = args.load_config().unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.base_model, "local/model");
    }

    #[test]
    fn test_summarize_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["reddit-summarizer", "summarize"]).is_err());
        assert!(Cli::try_parse_from([
            "reddit-summarizer", "summarize", "--example", "0", "--file", "post.txt",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["reddit-summarizer", "summarize", "--example", "2"]).is_ok());
    }
}
