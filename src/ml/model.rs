// ============================================================
// Layer 5 — Qwen3 Decoder
// ============================================================
// The base model is a decoder-only transformer in the Qwen3
// layout, assembled from Burn building blocks:
//
//   tokens ─► embed_tokens
//            ─► N × DecoderLayer
//                  x + Attention(RMSNorm(x))
//                  x + MLP(RMSNorm(x))
//            ─► RMSNorm ─► lm_head ─► logits
//
// Attention details specific to Qwen3:
//   • grouped-query attention (fewer key/value heads than query
//     heads; each kv head serves `heads / kv_heads` query heads)
//   • per-head RMSNorm on queries and keys before rotary encoding
//   • rotary position encoding in the "rotate half" layout
//
// Every projection is a LoraLinear so an adapter can be attached
// to whichever projections the checkpoint targets.
//
// Generation runs prompt-first then one token at a time; a KvCache
// keeps the keys and values of past positions so each step only
// processes the new token.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Su et al. (2021) RoFormer (rotary encoding)
//            Qwen3 technical report

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig, RmsNorm, RmsNormConfig},
    prelude::*,
    tensor::{activation, Bool, TensorData},
};
use serde::{Deserialize, Serialize};

use crate::ml::lora::{LoraConfig, LoraLinear};

// ─── Configuration ────────────────────────────────────────────────────────────
/// `eos_token_id` is a single id or a list of ids in config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EosTokens {
    One(u32),
    Many(Vec<u32>),
}

impl EosTokens {
    pub fn ids(&self) -> Vec<u32> {
        match self {
            EosTokens::One(id)   => vec![*id],
            EosTokens::Many(ids) => ids.clone(),
        }
    }
}

fn default_rms_norm_eps() -> f64 { 1e-6 }
fn default_rope_theta() -> f64 { 1_000_000.0 }
fn default_tie_word_embeddings() -> bool { true }

/// Architecture hyperparameters, read from the Hugging Face config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qwen3Config {
    pub vocab_size:              usize,
    pub hidden_size:             usize,
    pub intermediate_size:       usize,
    pub num_hidden_layers:       usize,
    pub num_attention_heads:     usize,
    pub num_key_value_heads:     usize,
    #[serde(default)]
    pub head_dim:                Option<usize>,
    #[serde(default = "default_rms_norm_eps")]
    pub rms_norm_eps:            f64,
    #[serde(default = "default_rope_theta")]
    pub rope_theta:              f64,
    pub max_position_embeddings: usize,
    #[serde(default = "default_tie_word_embeddings")]
    pub tie_word_embeddings:     bool,
    #[serde(default)]
    pub eos_token_id:            Option<EosTokens>,
}

impl Qwen3Config {
    pub fn head_dim(&self) -> usize {
        self.head_dim
            .unwrap_or(self.hidden_size / self.num_attention_heads)
    }

    /// Build a model with uninitialised weights; the loader fills them in.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Qwen3Model<B> {
        let embed_tokens = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let layers = (0..self.num_hidden_layers)
            .map(|_| self.build_layer(device))
            .collect();
        let norm = RmsNormConfig::new(self.hidden_size)
            .with_epsilon(self.rms_norm_eps)
            .init(device);
        let lm_head = (!self.tie_word_embeddings).then(|| {
            LinearConfig::new(self.hidden_size, self.vocab_size)
                .with_bias(false)
                .init(device)
        });
        Qwen3Model { embed_tokens, layers, norm, lm_head }
    }

    fn projection<B: Backend>(&self, d_in: usize, d_out: usize, device: &B::Device) -> LoraLinear<B> {
        LoraLinear::new(LinearConfig::new(d_in, d_out).with_bias(false).init(device))
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> DecoderLayer<B> {
        let head_dim = self.head_dim();
        let q_dim    = self.num_attention_heads * head_dim;
        let kv_dim   = self.num_key_value_heads * head_dim;
        let rms = |size: usize| RmsNormConfig::new(size).with_epsilon(self.rms_norm_eps).init(device);

        let self_attn = Attention {
            q_proj:   self.projection(self.hidden_size, q_dim, device),
            k_proj:   self.projection(self.hidden_size, kv_dim, device),
            v_proj:   self.projection(self.hidden_size, kv_dim, device),
            o_proj:   self.projection(q_dim, self.hidden_size, device),
            q_norm:   rms(head_dim),
            k_norm:   rms(head_dim),
            num_heads:    self.num_attention_heads,
            num_kv_heads: self.num_key_value_heads,
            head_dim,
        };
        let mlp = Mlp {
            gate_proj: self.projection(self.hidden_size, self.intermediate_size, device),
            up_proj:   self.projection(self.hidden_size, self.intermediate_size, device),
            down_proj: self.projection(self.intermediate_size, self.hidden_size, device),
        };
        DecoderLayer {
            input_layernorm:          rms(self.hidden_size),
            self_attn,
            post_attention_layernorm: rms(self.hidden_size),
            mlp,
        }
    }
}

// ─── Rotary position encoding ─────────────────────────────────────────────────
/// Precomputed cos / sin tables, `[max_positions, head_dim]`.
#[derive(Debug, Clone)]
pub struct RotaryTable<B: Backend> {
    cos: Tensor<B, 2>,
    sin: Tensor<B, 2>,
}

impl<B: Backend> RotaryTable<B> {
    pub fn new(head_dim: usize, max_positions: usize, theta: f64, device: &B::Device) -> Self {
        let half = head_dim / 2;
        let inv_freq: Vec<f64> = (0..half)
            .map(|i| 1.0 / theta.powf((2 * i) as f64 / head_dim as f64))
            .collect();

        let mut cos = Vec::with_capacity(max_positions * head_dim);
        let mut sin = Vec::with_capacity(max_positions * head_dim);
        for pos in 0..max_positions {
            // Both halves share the same frequencies in the rotate-half layout
            for _ in 0..2 {
                for f in &inv_freq {
                    let angle = pos as f64 * f;
                    cos.push(angle.cos() as f32);
                    sin.push(angle.sin() as f32);
                }
            }
        }

        let shape = [max_positions, head_dim];
        Self {
            cos: Tensor::from_data(TensorData::new(cos, shape), device),
            sin: Tensor::from_data(TensorData::new(sin, shape), device),
        }
    }

    pub fn max_positions(&self) -> usize {
        self.cos.dims()[0]
    }

    /// Rotate `x: [batch, heads, seq, head_dim]` for positions `offset..offset+seq`.
    pub fn apply(&self, x: Tensor<B, 4>, offset: usize) -> Tensor<B, 4> {
        let [batch, heads, seq, head_dim] = x.dims();
        let half = head_dim / 2;

        let cos = self.cos.clone()
            .slice([offset..offset + seq, 0..head_dim])
            .reshape([1, 1, seq, head_dim]);
        let sin = self.sin.clone()
            .slice([offset..offset + seq, 0..head_dim])
            .reshape([1, 1, seq, head_dim]);

        let x1 = x.clone().slice([0..batch, 0..heads, 0..seq, 0..half]);
        let x2 = x.clone().slice([0..batch, 0..heads, 0..seq, half..head_dim]);
        let rotated = Tensor::cat(vec![x2.neg(), x1], 3);

        x * cos + rotated * sin
    }
}

// ─── KV cache ─────────────────────────────────────────────────────────────────
/// Keys and values of every position processed so far, per layer.
pub struct KvCache<B: Backend> {
    layers: Vec<Option<(Tensor<B, 4>, Tensor<B, 4>)>>,
}

impl<B: Backend> KvCache<B> {
    pub fn new(num_layers: usize) -> Self {
        Self { layers: (0..num_layers).map(|_| None).collect() }
    }

    /// Number of positions already cached.
    pub fn len(&self) -> usize {
        self.layers
            .first()
            .and_then(|l| l.as_ref())
            .map(|(k, _)| k.dims()[2])
            .unwrap_or(0)
    }

    /// Append new keys / values for `layer` and return the full history.
    fn append(
        &mut self,
        layer: usize,
        k:     Tensor<B, 4>,
        v:     Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let (k, v) = match self.layers[layer].take() {
            Some((past_k, past_v)) => (
                Tensor::cat(vec![past_k, k], 2),
                Tensor::cat(vec![past_v, v], 2),
            ),
            None => (k, v),
        };
        self.layers[layer] = Some((k.clone(), v.clone()));
        (k, v)
    }
}

// ─── Modules ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    pub q_proj:       LoraLinear<B>,
    pub k_proj:       LoraLinear<B>,
    pub v_proj:       LoraLinear<B>,
    pub o_proj:       LoraLinear<B>,
    pub q_norm:       RmsNorm<B>,
    pub k_norm:       RmsNorm<B>,
    pub num_heads:    usize,
    pub num_kv_heads: usize,
    pub head_dim:     usize,
}

impl<B: Backend> Attention<B> {
    /// `offset` is the number of positions cached before this chunk.
    pub fn forward(
        &self,
        x:      Tensor<B, 3>,
        rope:   &RotaryTable<B>,
        cache:  &mut KvCache<B>,
        layer:  usize,
        offset: usize,
    ) -> Tensor<B, 3> {
        let [batch, seq, _] = x.dims();

        let q = self.q_proj.forward(x.clone())
            .reshape([batch, seq, self.num_heads, self.head_dim]);
        let k = self.k_proj.forward(x.clone())
            .reshape([batch, seq, self.num_kv_heads, self.head_dim]);
        let v = self.v_proj.forward(x)
            .reshape([batch, seq, self.num_kv_heads, self.head_dim]);

        // [batch, heads, seq, head_dim]
        let q = rope.apply(self.q_norm.forward(q).swap_dims(1, 2), offset);
        let k = rope.apply(self.k_norm.forward(k).swap_dims(1, 2), offset);
        let v = v.swap_dims(1, 2);

        let (k, v) = cache.append(layer, k, v);
        let k = self.repeat_kv(k);
        let v = self.repeat_kv(v);
        let total = k.dims()[2];

        let scale  = (self.head_dim as f64).sqrt().recip();
        let scores = q.matmul(k.swap_dims(2, 3)).mul_scalar(scale);
        let scores = if seq > 1 {
            let mask = causal_mask::<B>(seq, total, &scores.device())
                .reshape([1, 1, seq, total])
                .expand([batch, self.num_heads, seq, total]);
            scores.mask_fill(mask, f32::NEG_INFINITY)
        } else {
            scores
        };
        let weights = activation::softmax(scores, 3);

        let out = weights.matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq, self.num_heads * self.head_dim]);
        self.o_proj.forward(out)
    }

    /// Expand kv heads so each query head has a matching key / value head.
    fn repeat_kv(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let n_rep = self.num_heads / self.num_kv_heads;
        if n_rep == 1 {
            return x;
        }
        let [batch, kv_heads, seq, head_dim] = x.dims();
        x.reshape([batch, kv_heads, 1, seq, head_dim])
            .expand([batch, kv_heads, n_rep, seq, head_dim])
            .reshape([batch, kv_heads * n_rep, seq, head_dim])
    }
}

/// `true` where query `i` (of the newest `seq`) must not see key `j`.
fn causal_mask<B: Backend>(seq: usize, total: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    let past = total - seq;
    let data: Vec<bool> = (0..seq)
        .flat_map(|i| (0..total).map(move |j| j > past + i))
        .collect();
    Tensor::from_data(TensorData::new(data, [seq, total]), device)
}

#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    pub gate_proj: LoraLinear<B>,
    pub up_proj:   LoraLinear<B>,
    pub down_proj: LoraLinear<B>,
}

impl<B: Backend> Mlp<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let gate = activation::silu(self.gate_proj.forward(x.clone()));
        self.down_proj.forward(gate * self.up_proj.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub input_layernorm:          RmsNorm<B>,
    pub self_attn:                Attention<B>,
    pub post_attention_layernorm: RmsNorm<B>,
    pub mlp:                      Mlp<B>,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn forward(
        &self,
        x:      Tensor<B, 3>,
        rope:   &RotaryTable<B>,
        cache:  &mut KvCache<B>,
        layer:  usize,
        offset: usize,
    ) -> Tensor<B, 3> {
        let attn = self.self_attn.forward(self.input_layernorm.forward(x.clone()), rope, cache, layer, offset);
        let h = x + attn;
        h.clone() + self.mlp.forward(self.post_attention_layernorm.forward(h))
    }

    /// Look up a projection by its checkpoint name.
    pub fn projection_mut(&mut self, name: &str) -> Option<&mut LoraLinear<B>> {
        match name {
            "q_proj"    => Some(&mut self.self_attn.q_proj),
            "k_proj"    => Some(&mut self.self_attn.k_proj),
            "v_proj"    => Some(&mut self.self_attn.v_proj),
            "o_proj"    => Some(&mut self.self_attn.o_proj),
            "gate_proj" => Some(&mut self.mlp.gate_proj),
            "up_proj"   => Some(&mut self.mlp.up_proj),
            "down_proj" => Some(&mut self.mlp.down_proj),
            _           => None,
        }
    }
}

/// Names of every projection of a decoder layer, in checkpoint order.
pub const PROJECTIONS: [&str; 7] = [
    "q_proj", "k_proj", "v_proj", "o_proj", "gate_proj", "up_proj", "down_proj",
];

/// Sub-block a projection lives in, as it appears in weight names.
pub fn block_of(projection: &str) -> &'static str {
    match projection {
        "gate_proj" | "up_proj" | "down_proj" => "mlp",
        _                                     => "self_attn",
    }
}

#[derive(Module, Debug)]
pub struct Qwen3Model<B: Backend> {
    pub embed_tokens: Embedding<B>,
    pub layers:       Vec<DecoderLayer<B>>,
    pub norm:         RmsNorm<B>,
    /// Separate output projection; `None` when tied to `embed_tokens`
    pub lm_head:      Option<Linear<B>>,
}

impl<B: Backend> Qwen3Model<B> {
    /// input_ids: [batch, seq] → logits of the LAST position: [batch, vocab]
    pub fn forward_last(
        &self,
        input_ids: Tensor<B, 2, Int>,
        rope:      &RotaryTable<B>,
        cache:     &mut KvCache<B>,
    ) -> Tensor<B, 2> {
        let [batch, seq] = input_ids.dims();
        // Read before layer 0 appends this chunk
        let offset = cache.len();

        let mut x = self.embed_tokens.forward(input_ids);
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x, rope, cache, i, offset);
        }
        let hidden = x.dims()[2];

        let last = self.norm
            .forward(x.slice([0..batch, seq - 1..seq, 0..hidden]))
            .reshape([batch, hidden]);

        match &self.lm_head {
            Some(head) => head.forward(last),
            None       => last.matmul(self.embed_tokens.weight.val().transpose()),
        }
    }

    /// Attach fresh adapters to every projection `config` targets.
    pub fn attach_adapters(&mut self, config: &LoraConfig, device: &B::Device) {
        for layer in self.layers.iter_mut() {
            for name in PROJECTIONS {
                if let Some(proj) = layer.projection_mut(name) {
                    proj.attach(name, config, device);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ids(tokens: &[i64], device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2, Int> {
        Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(tokens.to_vec(), [tokens.len()]), device)
            .reshape([1, tokens.len()])
    }

    #[test]
    fn test_parse_hf_config() {
        let json = r#"{
            "architectures": ["Qwen3ForCausalLM"],
            "vocab_size": 151936, "hidden_size": 1024, "intermediate_size": 3072,
            "num_hidden_layers": 28, "num_attention_heads": 16, "num_key_value_heads": 8,
            "head_dim": 128, "max_position_embeddings": 32768, "rope_theta": 1000000,
            "rms_norm_eps": 1e-06, "tie_word_embeddings": true, "eos_token_id": 151643
        }"#;
        let cfg: Qwen3Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.head_dim(), 128);
        assert_eq!(cfg.eos_token_id.unwrap().ids(), vec![151643]);
    }

    #[test]
    fn test_head_dim_fallback() {
        let mut cfg = testing::tiny_config(10);
        cfg.head_dim = None;
        assert_eq!(cfg.head_dim(), 4);
    }

    #[test]
    fn test_causal_mask_with_past() {
        let device = Default::default();
        let mask = causal_mask::<TestBackend>(2, 3, &device)
            .into_data()
            .to_vec::<bool>()
            .unwrap();
        // one cached position, two new queries
        assert_eq!(mask, vec![false, false, true, false, false, false]);
    }

    #[test]
    fn test_forward_shapes_and_cache() {
        let device = Default::default();
        let cfg    = testing::tiny_config(12);
        let model: Qwen3Model<TestBackend> = cfg.init(&device);
        let rope   = RotaryTable::new(cfg.head_dim(), 32, cfg.rope_theta, &device);
        let mut cache = KvCache::new(cfg.num_hidden_layers);

        let logits = model.forward_last(ids(&[3, 4, 5], &device), &rope, &mut cache);
        assert_eq!(logits.dims(), [1, 12]);
        assert_eq!(cache.len(), 3);

        let logits = model.forward_last(ids(&[6], &device), &rope, &mut cache);
        assert_eq!(logits.dims(), [1, 12]);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_cached_step_matches_full_pass() {
        let device = Default::default();
        let cfg    = testing::tiny_config(12);
        let model: Qwen3Model<TestBackend> = cfg.init(&device);
        let rope   = RotaryTable::new(cfg.head_dim(), 32, cfg.rope_theta, &device);

        let mut full = KvCache::new(cfg.num_hidden_layers);
        let expected = model.forward_last(ids(&[3, 4, 5, 6], &device), &rope, &mut full);

        let mut incremental = KvCache::new(cfg.num_hidden_layers);
        model.forward_last(ids(&[3, 4, 5], &device), &rope, &mut incremental);
        let actual = model.forward_last(ids(&[6], &device), &rope, &mut incremental);

        let expected = expected.into_data().to_vec::<f32>().unwrap();
        let actual   = actual.into_data().to_vec::<f32>().unwrap();
        for (e, a) in expected.iter().zip(&actual) {
            assert!((e - a).abs() < 1e-4, "{e} vs {a}");
        }
    }

    #[test]
    fn test_prompt_longer_than_half_the_table() {
        let device = Default::default();
        let cfg    = testing::tiny_config(12);
        let model: Qwen3Model<TestBackend> = cfg.init(&device);
        let rope   = RotaryTable::new(cfg.head_dim(), 8, cfg.rope_theta, &device);
        let mut cache = KvCache::new(cfg.num_hidden_layers);

        // Every layer must rotate the prompt at positions 0..6
        let logits = model.forward_last(ids(&[1, 2, 3, 4, 5, 6], &device), &rope, &mut cache);
        assert_eq!(logits.dims(), [1, 12]);

        // ...and fill the table to its last position without overrunning it
        model.forward_last(ids(&[7], &device), &rope, &mut cache);
        let logits = model.forward_last(ids(&[8], &device), &rope, &mut cache);
        assert_eq!(logits.dims(), [1, 12]);
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_attach_adapters_targets_only_named_projections() {
        let device = Default::default();
        let cfg    = testing::tiny_config(12);
        let mut model: Qwen3Model<TestBackend> = cfg.init(&device);
        model.attach_adapters(&LoraConfig::default(), &device);

        for layer in &model.layers {
            assert!(layer.self_attn.q_proj.adapter.is_some());
            assert!(layer.self_attn.v_proj.adapter.is_some());
            assert!(layer.self_attn.k_proj.adapter.is_none());
            assert!(layer.mlp.up_proj.adapter.is_none());
        }
    }
}
