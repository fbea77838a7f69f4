// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer names a Burn backend; the application layer
// only sees GenerationWorker and plain request / string types.
//
// What's in this layer:
//
//   model.rs     — The Qwen3 decoder architecture
//                  • Token embeddings (tied output head)
//                  • Grouped-query self-attention with
//                    per-head RMSNorm and rotary encoding
//                  • SiLU-gated MLP
//                  • KV cache for incremental decoding
//
//   lora.rs      — Low-rank adapters on linear projections
//                  and the PEFT key naming they load from
//
//   loader.rs    — Fills the base model from safetensors and
//                  copies adapter weights in, with a report of
//                  anything that did not line up
//
//   sampler.rs   — Greedy and temperature + nucleus sampling
//
//   generator.rs — Prompt → tokens → decode loop → summary
//
//   worker.rs    — The single thread that owns the model and
//                  serves queued summary requests
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need
//            Hu et al. (2021) LoRA: Low-Rank Adaptation

/// Qwen3 decoder built from burn::nn blocks
pub mod model;

/// LoRA adapters and adapter key parsing
pub mod lora;

/// Base and adapter weight loading
pub mod loader;

/// Next-token selection
pub mod sampler;

/// Summary generation loop
pub mod generator;

/// Model-owning worker thread
pub mod worker;
