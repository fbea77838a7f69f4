// ============================================================
// Layer 5 — Generation Worker
// ============================================================
// The model is large, read-only once built, and a GPU backend is
// best driven from a single thread. So one dedicated thread owns
// it and every summary request is queued to that thread:
//
//   caller ──(request, reply channel)──► job queue ──► worker
//   caller ◄──────────── Result<String> ─────────────── worker
//
// Requests are therefore served one at a time, in arrival order.
//
// The backend is chosen at runtime from ComputeDevice; the rest
// of the program never names a Burn backend.
//
// Reference: Rust Book §16 (Message Passing with mpsc)
//            Burn Book §2 (Backends)

use anyhow::{Context, Result};
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::PathBuf,
    str::FromStr,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Mutex},
    thread,
};

use crate::domain::{post::SummaryRequest, traits::PostSummarizer};
use crate::infra::model_files::resolve_model_files;
use crate::ml::generator::{GenerationConfig, Generator};

/// Where the model runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// GPU through Burn's wgpu backend
    #[default]
    Wgpu,
    /// CPU through Burn's ndarray backend
    Cpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Wgpu => write!(f, "wgpu"),
            ComputeDevice::Cpu  => write!(f, "cpu"),
        }
    }
}

impl FromStr for ComputeDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgpu" | "gpu" => Ok(ComputeDevice::Wgpu),
            "cpu"          => Ok(ComputeDevice::Cpu),
            other          => Err(format!("unknown device '{other}' (expected wgpu or cpu)")),
        }
    }
}

/// Everything needed to build the fine-tuned model.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Local directory or Hugging Face Hub repository id
    pub base_model:     String,
    pub checkpoint:     PathBuf,
    pub strict_adapter: bool,
    pub device:         ComputeDevice,
    pub generation:     GenerationConfig,
}

type Reply = mpsc::Sender<Result<String>>;
type Job   = (SummaryRequest, Reply);

/// Handle to the thread that owns the model.
pub struct GenerationWorker {
    jobs: Mutex<mpsc::Sender<Job>>,
}

impl GenerationWorker {
    /// Start the worker thread and wait until the model is loaded.
    ///
    /// A load failure is returned here and the thread exits.
    pub fn spawn(spec: ModelSpec) -> Result<Self> {
        let (job_tx, job_rx)     = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        thread::Builder::new()
            .name("generation-worker".into())
            .spawn(move || match spec.device {
                ComputeDevice::Wgpu => serve::<Wgpu>(&spec, WgpuDevice::default(), ready_tx, job_rx),
                ComputeDevice::Cpu  => serve::<NdArray>(&spec, NdArrayDevice::default(), ready_tx, job_rx),
            })
            .context("Cannot start generation worker thread")?;

        ready_rx
            .recv()
            .context("Generation worker exited before reporting readiness")??;
        Ok(Self { jobs: Mutex::new(job_tx) })
    }
}

impl PostSummarizer for GenerationWorker {
    fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.jobs
            .lock()
            .map_err(|_| anyhow::anyhow!("Generation queue lock poisoned"))?
            .send((request.clone(), reply_tx))
            .map_err(|_| anyhow::anyhow!("Generation worker has stopped"))?;
        reply_rx
            .recv()
            .context("Generation worker dropped the request")?
    }
}

fn serve<B: Backend>(
    spec:   &ModelSpec,
    device: B::Device,
    ready:  mpsc::Sender<Result<()>>,
    jobs:   mpsc::Receiver<Job>,
) {
    tracing::info!("Loading model '{}' on {}", spec.base_model, spec.device);
    let loaded = resolve_model_files(&spec.base_model).and_then(|files| {
        Generator::<B>::load(
            &files,
            &spec.checkpoint,
            spec.strict_adapter,
            spec.generation.clone(),
            device,
        )
    });

    let generator = match loaded {
        Ok(generator) => {
            let _ = ready.send(Ok(()));
            generator
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    tracing::info!("Model ready");

    // Runs until every GenerationWorker handle is dropped
    for (request, reply) in jobs {
        let result = guarded(|| generator.summarize(&request));
        if let Err(e) = &result {
            tracing::error!("Summary failed: {e:#}");
        }
        let _ = reply.send(result);
    }
    tracing::debug!("Generation worker stopped");
}

/// Run one job, turning a panic into an error so the worker keeps serving.
fn guarded(job: impl FnOnce() -> Result<String>) -> Result<String> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(anyhow::anyhow!("Generation panicked: {message}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::generator::testing::{write_tiny_adapter, write_tiny_model};
    use std::sync::Arc;

    fn spec(dir: &std::path::Path, checkpoint: PathBuf) -> ModelSpec {
        ModelSpec {
            base_model:     dir.to_str().unwrap().to_string(),
            checkpoint,
            strict_adapter: true,
            device:         ComputeDevice::Cpu,
            generation:     GenerationConfig { do_sample: false, max_new_tokens: 5, ..Default::default() },
        }
    }

    #[test]
    fn test_device_names() {
        let d: ComputeDevice = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(d, ComputeDevice::Cpu);
        assert_eq!(ComputeDevice::default().to_string(), "wgpu");
        assert_eq!("CPU".parse::<ComputeDevice>().unwrap(), ComputeDevice::Cpu);
        assert!("tpu".parse::<ComputeDevice>().is_err());
    }

    #[test]
    fn test_worker_serves_concurrent_callers() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let adapter = write_tiny_adapter(dir.path());
        let worker  = Arc::new(GenerationWorker::spawn(spec(dir.path(), adapter)).unwrap());

        let request = SummaryRequest::new("cats sleep a lot");
        let expected = worker.summarize(&request).unwrap();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let worker  = Arc::clone(&worker);
                let request = request.clone();
                thread::spawn(move || worker.summarize(&request).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }

    #[test]
    fn test_guarded_turns_panic_into_error() {
        let err = guarded(|| panic!("shape mismatch")).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"), "{err}");
        assert_eq!(guarded(|| Ok("fine".into())).unwrap(), "fine");
    }

    #[test]
    fn test_worker_survives_long_then_short_post() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let adapter = write_tiny_adapter(dir.path());
        let worker  = GenerationWorker::spawn(spec(dir.path(), adapter)).unwrap();

        let long = vec!["cats sleep a lot"; 200].join(" ");
        assert!(worker.summarize(&SummaryRequest::new(long)).is_ok());
        assert!(worker.summarize(&SummaryRequest::new("cats sleep a lot")).is_ok());
    }

    #[test]
    fn test_load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let result = GenerationWorker::spawn(spec(dir.path(), dir.path().join("missing.safetensors")));
        assert!(result.is_err());
    }
}
