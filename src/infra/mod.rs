// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File formats and external sources that don't belong to any
// one business layer:
//
//   weights.rs         — Memory-mapped safetensors files
//                        Reads tensors by name, widens f16 /
//                        bf16 to f32, merges sharded files.
//
//   checkpoint.rs      — Adapter checkpoint reader
//                        Requires the lora_state_dict namespace
//                        and rebuilds the LoRA configuration from
//                        the header metadata.
//
//   model_files.rs     — Base model resolution
//                        A local directory, or a Hugging Face Hub
//                        repository downloaded into the hf-hub
//                        cache.
//
//   tokenizer_store.rs — Tokenizer loading
//                        Loads tokenizer.json and knows which
//                        tokens end a sequence.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            safetensors / hf-hub crate documentation

/// Safetensors reading
pub mod weights;

/// Adapter checkpoint loading
pub mod checkpoint;

/// Base model file resolution (local or Hub)
pub mod model_files;

/// Tokenizer loading
pub mod tokenizer_store;
