// ============================================================
// Layer 5 — LoRA Adapter
// ============================================================
// Low-Rank Adaptation (Hu et al., 2021) freezes a pretrained
// projection W and learns a low-rank update next to it:
//
//   y = W·x + (alpha / r) · B·A·dropout(x)
//
//   A: d_in  → r      (lora_A)
//   B: r     → d_out  (lora_B, zero-initialised)
//
// Because B starts at zero, attaching an adapter whose weights are
// never loaded leaves the base model unchanged.
//
// This module only covers inference: adapters are attached to the
// projections named in `target_modules` and filled from a training
// checkpoint. Dropout is kept so the module mirrors the training
// configuration, but it is inert outside autodiff backends.
//
// Reference: Hu et al. (2021) LoRA: Low-Rank Adaptation of LLMs
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Which biases the adapter training touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoraBias {
    /// No bias was trained; bias tensors in a checkpoint are unexpected.
    #[default]
    None,
    /// Every bias was trained.
    All,
    /// Only biases of adapted projections were trained.
    LoraOnly,
}

impl LoraBias {
    /// Whether a bias of a projection is loaded; `adapted` is true when
    /// the projection carries an adapter.
    pub fn loads_bias(self, adapted: bool) -> bool {
        match self {
            LoraBias::None     => false,
            LoraBias::All      => true,
            LoraBias::LoraOnly => adapted,
        }
    }
}

/// Hyperparameters of a LoRA adapter.
/// Every field falls back to its default individually when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraConfig {
    /// Rank of the update
    pub r: usize,

    /// Scaling numerator; the update is scaled by alpha / r
    pub alpha: f64,

    /// Projection names to adapt, e.g. "q_proj"
    pub target_modules: Vec<String>,

    /// Dropout applied to the adapter input during training
    pub dropout: f64,

    pub bias: LoraBias,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            r:              8,
            alpha:          16.0,
            target_modules: vec!["q_proj".to_string(), "v_proj".to_string()],
            dropout:        0.1,
            bias:           LoraBias::None,
        }
    }
}

impl LoraConfig {
    pub fn scaling(&self) -> f64 {
        self.alpha / self.r as f64
    }

    pub fn targets(&self, projection: &str) -> bool {
        self.target_modules.iter().any(|m| m == projection)
    }

    /// Build a fresh adapter for a `d_input → d_output` projection.
    pub fn init_adapter<B: Backend>(
        &self,
        d_input:  usize,
        d_output: usize,
        device:   &B::Device,
    ) -> LoraAdapter<B> {
        let lora_a = LinearConfig::new(d_input, self.r)
            .with_bias(false)
            .init(device);
        let lora_b = LinearConfig::new(self.r, d_output)
            .with_bias(false)
            .with_initializer(Initializer::Zeros)
            .init(device);
        LoraAdapter {
            lora_a,
            lora_b,
            dropout: DropoutConfig::new(self.dropout).init(),
            scaling: self.scaling(),
        }
    }
}

// ─── Modules ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LoraAdapter<B: Backend> {
    pub lora_a:  Linear<B>,
    pub lora_b:  Linear<B>,
    pub dropout: Dropout,
    pub scaling: f64,
}

impl<B: Backend> LoraAdapter<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let update = self.lora_b.forward(self.lora_a.forward(self.dropout.forward(x)));
        update.mul_scalar(self.scaling)
    }
}

/// A frozen projection with an optional adapter beside it.
#[derive(Module, Debug)]
pub struct LoraLinear<B: Backend> {
    pub base:    Linear<B>,
    pub adapter: Option<LoraAdapter<B>>,
}

impl<B: Backend> LoraLinear<B> {
    pub fn new(base: Linear<B>) -> Self {
        Self { base, adapter: None }
    }

    /// Attach a fresh adapter when `config` targets `projection`.
    pub fn attach(&mut self, projection: &str, config: &LoraConfig, device: &B::Device) {
        if !config.targets(projection) {
            return;
        }
        let [d_input, d_output] = self.base.weight.val().dims();
        self.adapter = Some(config.init_adapter(d_input, d_output, device));
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match &self.adapter {
            Some(adapter) => self.base.forward(x.clone()) + adapter.forward(x),
            None          => self.base.forward(x),
        }
    }
}

// ─── Checkpoint keys ──────────────────────────────────────────────────────────
/// The role of one adapter checkpoint tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterParam {
    LoraA,
    LoraB,
    Bias,
}

/// A checkpoint key resolved to a layer, a projection and a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterKey {
    pub layer:      usize,
    pub projection: String,
    pub param:      AdapterParam,
}

/// Parse a PEFT state-dict key such as
/// `base_model.model.model.layers.3.self_attn.q_proj.lora_A.default.weight`.
///
/// The `base_model.model.` wrapper prefix and the adapter name segment
/// (`default`) are optional. Returns `None` for keys that do not name an
/// adapter or bias tensor of a decoder projection.
pub fn parse_adapter_key(key: &str) -> Option<AdapterKey> {
    let key = key.strip_prefix("base_model.model.").unwrap_or(key);
    let rest = key.strip_prefix("model.layers.")?;

    let parts: Vec<&str> = rest.split('.').collect();
    // layer . block . projection . tail...
    if parts.len() < 4 {
        return None;
    }
    let layer = parts[0].parse().ok()?;
    if !matches!(parts[1], "self_attn" | "mlp") {
        return None;
    }
    let projection = parts[2].to_string();

    let param = match &parts[3..] {
        ["lora_A", "weight"] | ["lora_A", _, "weight"] => AdapterParam::LoraA,
        ["lora_B", "weight"] | ["lora_B", _, "weight"] => AdapterParam::LoraB,
        ["bias"] | ["base_layer", "bias"]              => AdapterParam::Bias,
        _ => return None,
    };

    Some(AdapterKey { layer, projection, param })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_default_config() {
        let cfg = LoraConfig::default();
        assert_eq!(cfg.r, 8);
        assert_eq!(cfg.scaling(), 2.0);
        assert!(cfg.targets("q_proj"));
        assert!(cfg.targets("v_proj"));
        assert!(!cfg.targets("k_proj"));
        assert_eq!(cfg.bias, LoraBias::None);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let cfg: LoraConfig = serde_json::from_str(r#"{"r": 4, "bias": "lora_only"}"#).unwrap();
        assert_eq!(cfg.r, 4);
        assert_eq!(cfg.alpha, 16.0);
        assert_eq!(cfg.dropout, 0.1);
        assert_eq!(cfg.bias, LoraBias::LoraOnly);
        assert!(cfg.bias.loads_bias(true));
        assert!(!cfg.bias.loads_bias(false));
    }

    #[test]
    fn test_fresh_adapter_is_identity() {
        let device = Default::default();
        let base   = LinearConfig::new(6, 4).init::<TestBackend>(&device);
        let mut proj = LoraLinear::new(base);

        let x = Tensor::<TestBackend, 3>::ones([1, 2, 6], &device);
        let before = proj.forward(x.clone());

        proj.attach("q_proj", &LoraConfig::default(), &device);
        assert!(proj.adapter.is_some());
        let after = proj.forward(x);

        let before = before.into_data().to_vec::<f32>().unwrap();
        let after  = after.into_data().to_vec::<f32>().unwrap();
        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() < 1e-6);
        }
    }

    #[test]
    fn test_untargeted_projection_stays_plain() {
        let device = Default::default();
        let base   = LinearConfig::new(6, 4).init::<TestBackend>(&device);
        let mut proj = LoraLinear::new(base);
        proj.attach("o_proj", &LoraConfig::default(), &device);
        assert!(proj.adapter.is_none());
    }

    #[test]
    fn test_parse_peft_keys() {
        assert_eq!(
            parse_adapter_key("base_model.model.model.layers.3.self_attn.q_proj.lora_A.default.weight"),
            Some(AdapterKey { layer: 3, projection: "q_proj".into(), param: AdapterParam::LoraA })
        );
        assert_eq!(
            parse_adapter_key("model.layers.0.mlp.down_proj.lora_B.weight"),
            Some(AdapterKey { layer: 0, projection: "down_proj".into(), param: AdapterParam::LoraB })
        );
        assert_eq!(
            parse_adapter_key("base_model.model.model.layers.1.self_attn.v_proj.base_layer.bias"),
            Some(AdapterKey { layer: 1, projection: "v_proj".into(), param: AdapterParam::Bias })
        );
        assert_eq!(parse_adapter_key("base_model.model.lm_head.weight"), None);
        assert_eq!(parse_adapter_key("model.layers.x.self_attn.q_proj.lora_A.weight"), None);
    }
}
