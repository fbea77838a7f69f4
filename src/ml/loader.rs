// ============================================================
// Layer 5 — Model Loader
// ============================================================
// Rebuilds the fine-tuned model in four steps:
//
//   1. Read config.json and build an empty Qwen3Model
//   2. Fill every base weight from the safetensors store (strict:
//      a missing base tensor is an error)
//   3. Attach fresh LoRA adapters to the targeted projections
//   4. Copy the checkpoint's adapter tensors into them (lenient)
//
// Step 4 tolerates keys that do not line up with the model, but it
// never hides them: the AdapterLoadReport lists every unexpected
// key, every shape mismatch and every targeted weight the
// checkpoint did not provide, and the loader logs it as a warning.
// With `strict` set, a non-clean report is an error instead.
//
// Hugging Face stores linear weights as [out, in]; Burn's Linear
// expects [in, out], so every projection weight is transposed.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Hugging Face PEFT state-dict naming

use anyhow::{Context, Result};
use burn::{module::Param, prelude::*};
use std::{collections::HashSet, fs, path::Path};

use crate::infra::{
    checkpoint::{AdapterCheckpoint, CheckpointError},
    weights::{HostTensor, WeightStore},
};
use crate::ml::{
    lora::{parse_adapter_key, AdapterParam, LoraConfig, LoraLinear},
    model::{block_of, Qwen3Config, Qwen3Model, PROJECTIONS},
};

/// Read the architecture hyperparameters from a config.json file.
pub fn load_config(path: &Path) -> Result<Qwen3Config> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed model config '{}'", path.display()))
}

// ─── Base weights ─────────────────────────────────────────────────────────────
fn linear_weight<B: Backend>(
    store:  &WeightStore,
    name:   &str,
    device: &B::Device,
) -> Result<Param<Tensor<B, 2>>> {
    let w: Tensor<B, 2> = store.tensor(name, device)?;
    Ok(Param::from_tensor(w.transpose()))
}

fn vector<B: Backend>(
    store:  &WeightStore,
    name:   &str,
    device: &B::Device,
) -> Result<Param<Tensor<B, 1>>> {
    Ok(Param::from_tensor(store.tensor(name, device)?))
}

/// Build the base model and fill all of its weights from `store`.
pub fn load_base_model<B: Backend>(
    config: &Qwen3Config,
    store:  &WeightStore,
    device: &B::Device,
) -> Result<Qwen3Model<B>> {
    let mut model = config.init::<B>(device);

    model.embed_tokens.weight = Param::from_tensor(store.tensor("model.embed_tokens.weight", device)?);
    model.norm.gamma = vector(store, "model.norm.weight", device)?;
    if let Some(head) = model.lm_head.as_mut() {
        head.weight = linear_weight(store, "lm_head.weight", device)?;
    }

    for (i, layer) in model.layers.iter_mut().enumerate() {
        let prefix = format!("model.layers.{i}");

        layer.input_layernorm.gamma =
            vector(store, &format!("{prefix}.input_layernorm.weight"), device)?;
        layer.post_attention_layernorm.gamma =
            vector(store, &format!("{prefix}.post_attention_layernorm.weight"), device)?;
        layer.self_attn.q_norm.gamma =
            vector(store, &format!("{prefix}.self_attn.q_norm.weight"), device)?;
        layer.self_attn.k_norm.gamma =
            vector(store, &format!("{prefix}.self_attn.k_norm.weight"), device)?;

        for name in PROJECTIONS {
            let key = format!("{prefix}.{}.{name}", block_of(name));
            let proj = layer
                .projection_mut(name)
                .with_context(|| format!("Unknown projection '{name}'"))?;
            proj.base.weight = linear_weight(store, &format!("{key}.weight"), device)?;
            let bias_key = format!("{key}.bias");
            if store.contains(&bias_key) {
                proj.base.bias = Some(vector(store, &bias_key, device)?);
            }
        }
        tracing::debug!("Loaded base weights for layer {i}");
    }

    tracing::info!(
        "Base model ready: {} layers, hidden={}, vocab={}",
        config.num_hidden_layers,
        config.hidden_size,
        config.vocab_size
    );
    Ok(model)
}

// ─── Adapter weights ──────────────────────────────────────────────────────────
/// Outcome of copying checkpoint tensors into the attached adapters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdapterLoadReport {
    /// Number of tensors copied into the model
    pub applied: usize,

    /// Checkpoint keys with no matching parameter
    pub unexpected: Vec<String>,

    /// Keys whose tensor shape differs from the parameter:
    /// (key, shape in checkpoint, shape the model expects)
    pub mismatched: Vec<(String, Vec<usize>, Vec<usize>)>,

    /// Adapter parameters the checkpoint did not provide
    pub missing: Vec<String>,
}

impl AdapterLoadReport {
    pub fn is_clean(&self) -> bool {
        self.unexpected.is_empty() && self.mismatched.is_empty() && self.missing.is_empty()
    }

    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected keys {:?}", self.unexpected));
        }
        if !self.mismatched.is_empty() {
            let shapes: Vec<String> = self
                .mismatched
                .iter()
                .map(|(k, found, expected)| format!("{k} {found:?} != {expected:?}"))
                .collect();
            parts.push(format!("shape mismatches [{}]", shapes.join(", ")));
        }
        if !self.missing.is_empty() {
            parts.push(format!("missing keys {:?}", self.missing));
        }
        parts.join("; ")
    }
}

/// Copy `tensor` into a `[in, out]` linear weight, checking its `[out, in]` shape.
fn assign_linear<B: Backend>(
    target:  &mut Param<Tensor<B, 2>>,
    key:     &str,
    tensor:  HostTensor,
    device:  &B::Device,
    report:  &mut AdapterLoadReport,
) -> Result<()> {
    let [d_in, d_out] = target.val().dims();
    let expected = vec![d_out, d_in];
    if tensor.shape != expected {
        report.mismatched.push((key.to_string(), tensor.shape, expected));
        return Ok(());
    }
    let w: Tensor<B, 2> = tensor.into_tensor(key, device)?;
    *target = Param::from_tensor(w.transpose());
    report.applied += 1;
    Ok(())
}

fn assign_bias<B: Backend>(
    proj:    &mut LoraLinear<B>,
    key:     &str,
    tensor:  HostTensor,
    device:  &B::Device,
    report:  &mut AdapterLoadReport,
) -> Result<()> {
    let d_out = proj.base.weight.val().dims()[1];
    if tensor.shape != vec![d_out] {
        report.mismatched.push((key.to_string(), tensor.shape, vec![d_out]));
        return Ok(());
    }
    proj.base.bias = Some(Param::from_tensor(tensor.into_tensor(key, device)?));
    report.applied += 1;
    Ok(())
}

/// Copy adapter tensors from `weights` into the adapters attached to `model`.
pub fn apply_adapter_weights<B: Backend>(
    model:   &mut Qwen3Model<B>,
    lora:    &LoraConfig,
    weights: Vec<(String, HostTensor)>,
    device:  &B::Device,
) -> Result<AdapterLoadReport> {
    let mut report = AdapterLoadReport::default();
    let mut seen: HashSet<(usize, String, bool)> = HashSet::new();

    for (key, tensor) in weights {
        let Some(parsed) = parse_adapter_key(&key) else {
            report.unexpected.push(key);
            continue;
        };
        let Some(proj) = model
            .layers
            .get_mut(parsed.layer)
            .and_then(|layer| layer.projection_mut(&parsed.projection))
        else {
            report.unexpected.push(key);
            continue;
        };

        match parsed.param {
            AdapterParam::Bias if lora.bias.loads_bias(proj.adapter.is_some()) => {
                assign_bias(proj, &key, tensor, device, &mut report)?;
            }
            AdapterParam::Bias => report.unexpected.push(key),
            AdapterParam::LoraA | AdapterParam::LoraB => {
                let Some(adapter) = proj.adapter.as_mut() else {
                    report.unexpected.push(key);
                    continue;
                };
                let is_a = parsed.param == AdapterParam::LoraA;
                let target = if is_a { &mut adapter.lora_a.weight } else { &mut adapter.lora_b.weight };
                let before = report.applied;
                assign_linear(target, &key, tensor, device, &mut report)?;
                if report.applied > before {
                    seen.insert((parsed.layer, parsed.projection.clone(), is_a));
                }
            }
        }
    }

    // Every attached adapter should have received both of its matrices
    for (i, layer) in model.layers.iter_mut().enumerate() {
        for name in PROJECTIONS {
            let attached = layer
                .projection_mut(name)
                .map(|p| p.adapter.is_some())
                .unwrap_or(false);
            if !attached {
                continue;
            }
            for (is_a, label) in [(true, "lora_A"), (false, "lora_B")] {
                if !seen.contains(&(i, name.to_string(), is_a)) {
                    report
                        .missing
                        .push(format!("model.layers.{i}.{}.{name}.{label}.weight", block_of(name)));
                }
            }
        }
    }

    Ok(report)
}

/// Attach adapters described by `checkpoint` and load its weights.
///
/// Mismatches are logged; with `strict` they abort the load.
pub fn attach_checkpoint<B: Backend>(
    model:      &mut Qwen3Model<B>,
    checkpoint: AdapterCheckpoint,
    strict:     bool,
    device:     &B::Device,
) -> Result<AdapterLoadReport> {
    let AdapterCheckpoint { path, weights, lora } = checkpoint;

    model.attach_adapters(&lora, device);
    let report = apply_adapter_weights(model, &lora, weights, device)?;

    if report.is_clean() {
        tracing::info!("Applied {} adapter tensors from '{}'", report.applied, path.display());
    } else if strict {
        return Err(CheckpointError::AdapterMismatch(report.summary()).into());
    } else {
        tracing::warn!(
            "Applied {} adapter tensors from '{}' with mismatches: {}",
            report.applied,
            path.display(),
            report.summary()
        );
    }
    Ok(report)
}
