// ============================================================
// Layer 6 — Safetensors Weight Store
// ============================================================
// Reads tensors out of .safetensors files and turns them into
// Burn tensors on the inference device.
//
// A safetensors file is a little-endian JSON header followed by
// raw tensor bytes. We memory-map the file and parse the header
// on demand, so only the tensors actually requested are copied
// out and converted.
//
// Hugging Face checkpoints are usually stored as bf16; Burn works
// in f32 here, so every tensor is widened on the way in.
//
// A base model can be split over several shard files. WeightStore
// keeps an index from tensor name to shard.
//
// Reference: safetensors format specification
//            memmap2 crate documentation

use anyhow::{Context, Result};
use burn::prelude::*;
use burn::tensor::TensorData;
use memmap2::Mmap;
use safetensors::{Dtype, SafeTensors};
use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Errors raised while reading weights.
#[derive(Debug, Error)]
pub enum WeightError {
    /// A tensor the model needs is absent from every weight file.
    #[error("Tensor '{0}' not found in model weights")]
    MissingTensor(String),

    /// Only floating point weights are supported.
    #[error("Tensor '{name}' has unsupported dtype {dtype:?}")]
    UnsupportedDtype { name: String, dtype: Dtype },

    /// The tensor does not have the expected number of dimensions.
    #[error("Tensor '{name}' has rank {found}, expected {expected}")]
    RankMismatch { name: String, expected: usize, found: usize },
}

// ─── HostTensor ───────────────────────────────────────────────────────────────
/// A tensor copied out of a weight file, widened to f32, still on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    pub shape: Vec<usize>,
    pub data:  Vec<f32>,
}

impl HostTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Upload to `device` as a rank-`D` Burn tensor.
    pub fn into_tensor<B: Backend, const D: usize>(
        self,
        name:   &str,
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        if self.shape.len() != D {
            return Err(WeightError::RankMismatch {
                name:     name.to_string(),
                expected: D,
                found:    self.shape.len(),
            }
            .into());
        }
        Ok(Tensor::from_data(TensorData::new(self.data, self.shape), device))
    }
}

// ─── SafetensorsFile ──────────────────────────────────────────────────────────
/// One memory-mapped .safetensors file.
pub struct SafetensorsFile {
    path: PathBuf,
    mmap: Mmap,
}

impl SafetensorsFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Cannot open weights '{}'", path.display()))?;

        // SAFETY: the file is opened read-only and is not modified while mapped.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Cannot map weights '{}'", path.display()))?;

        Ok(Self { path, mmap })
    }

    fn parse(&self) -> Result<SafeTensors<'_>> {
        SafeTensors::deserialize(&self.mmap)
            .with_context(|| format!("Invalid safetensors file '{}'", self.path.display()))
    }

    /// Names of every tensor stored in the file.
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.parse()?.names().into_iter().cloned().collect())
    }

    /// The free-form `__metadata__` string map of the header.
    pub fn metadata(&self) -> Result<HashMap<String, String>> {
        let (_, metadata) = SafeTensors::read_metadata(&self.mmap)
            .with_context(|| format!("Invalid safetensors header in '{}'", self.path.display()))?;
        Ok(metadata.metadata().clone().unwrap_or_default())
    }

    /// Copy the tensor `name` out of the file, or `None` if absent.
    pub fn read(&self, name: &str) -> Result<Option<HostTensor>> {
        let tensors = self.parse()?;
        let view = match tensors.tensor(name) {
            Ok(view) => view,
            Err(safetensors::SafeTensorError::TensorNotFound(_)) => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Cannot read '{name}' from '{}'", self.path.display())
                })
            }
        };

        let data = widen_to_f32(name, view.dtype(), view.data())?;
        Ok(Some(HostTensor::new(view.shape().to_vec(), data)))
    }
}

/// Convert little-endian f32 / f16 / bf16 bytes into f32 values.
fn widen_to_f32(name: &str, dtype: Dtype, bytes: &[u8]) -> Result<Vec<f32>> {
    let values = match dtype {
        Dtype::F32 => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F16 => bytes
            .chunks_exact(2)
            .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        Dtype::BF16 => bytes
            .chunks_exact(2)
            .map(|b| half::bf16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        other => {
            return Err(WeightError::UnsupportedDtype { name: name.to_string(), dtype: other }.into())
        }
    };
    Ok(values)
}

// ─── WeightStore ──────────────────────────────────────────────────────────────
/// All weight shards of a base model, addressed by tensor name.
pub struct WeightStore {
    files: Vec<SafetensorsFile>,
    index: HashMap<String, usize>,
}

impl WeightStore {
    /// Open every shard and index its tensor names.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        let mut index = HashMap::new();

        for (shard, path) in paths.iter().enumerate() {
            let file = SafetensorsFile::open(path)?;
            for name in file.names()? {
                index.insert(name, shard);
            }
            files.push(file);
        }

        tracing::debug!("Indexed {} tensors across {} shard(s)", index.len(), files.len());
        Ok(Self { files, index })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Read `name` as a host tensor; a missing tensor is an error.
    pub fn host(&self, name: &str) -> Result<HostTensor> {
        let shard = *self
            .index
            .get(name)
            .ok_or_else(|| WeightError::MissingTensor(name.to_string()))?;
        self.files[shard]
            .read(name)?
            .ok_or_else(|| WeightError::MissingTensor(name.to_string()).into())
    }

    /// Read `name` and upload it as a rank-`D` tensor.
    pub fn tensor<B: Backend, const D: usize>(
        &self,
        name:   &str,
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        self.host(name)?.into_tensor(name, device)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for writing small safetensors files in tests.

    use safetensors::{tensor::TensorView, Dtype};
    use std::{collections::HashMap, path::Path};

    use super::HostTensor;

    /// Write `tensors` as f32 plus an optional metadata map.
    pub fn write_f32(
        path:     &Path,
        tensors:  &[(String, HostTensor)],
        metadata: Option<HashMap<String, String>>,
    ) {
        let bytes: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
            .iter()
            .map(|(name, t)| {
                let raw = t.data.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name.clone(), t.shape.clone(), raw)
            })
            .collect();

        let views: Vec<(String, TensorView<'_>)> = bytes
            .iter()
            .map(|(name, shape, raw)| {
                (name.clone(), TensorView::new(Dtype::F32, shape.clone(), raw).unwrap())
            })
            .collect();

        safetensors::serialize_to_file(views, &metadata, path).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_widen_bf16() {
        let one = half::bf16::from_f32(1.5).to_le_bytes();
        let two = half::bf16::from_f32(-2.0).to_le_bytes();
        let out = widen_to_f32("x", Dtype::BF16, &[one[0], one[1], two[0], two[1]]).unwrap();
        assert_eq!(out, vec![1.5, -2.0]);
    }

    #[test]
    fn test_unsupported_dtype() {
        let err = widen_to_f32("ids", Dtype::I64, &[0; 8]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WeightError>(),
            Some(WeightError::UnsupportedDtype { .. })
        ));
    }

    #[test]
    fn test_store_reads_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        let a   = dir.path().join("a.safetensors");
        let b   = dir.path().join("b.safetensors");
        testing::write_f32(&a, &[("w".into(), HostTensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]))], None);
        testing::write_f32(&b, &[("v".into(), HostTensor::new(vec![3], vec![5.0, 6.0, 7.0]))], None);

        let store = WeightStore::open(&[a, b]).unwrap();
        assert!(store.contains("w"));
        assert!(store.contains("v"));
        assert_eq!(store.host("v").unwrap().data, vec![5.0, 6.0, 7.0]);

        let device = Default::default();
        let w: Tensor<TestBackend, 2> = store.tensor("w", &device).unwrap();
        assert_eq!(w.dims(), [2, 2]);

        let missing = store.host("nope").unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<WeightError>(),
            Some(WeightError::MissingTensor(_))
        ));
    }

    #[test]
    fn test_rank_mismatch() {
        let device = Default::default();
        let t = HostTensor::new(vec![4], vec![0.0; 4]);
        let err = t.into_tensor::<TestBackend, 2>("bias", &device).unwrap_err();
        assert!(err.to_string().contains("rank 1"));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.safetensors");
        let mut meta = HashMap::new();
        meta.insert("config".to_string(), "{}".to_string());
        testing::write_f32(&path, &[("x".into(), HostTensor::new(vec![1], vec![0.0]))], Some(meta));

        let file = SafetensorsFile::open(&path).unwrap();
        assert_eq!(file.metadata().unwrap().get("config").map(String::as_str), Some("{}"));
        assert_eq!(file.read("missing").unwrap(), None);
    }
}
