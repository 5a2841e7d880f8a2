//! Inference seam and the ONNX Runtime implementation.

use std::borrow::Cow;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ndarray::{ArrayViewMut3, Ix3};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::debug;

use crate::tensor::TokenizedBatch;
use crate::EmbedError;

/// One forward pass: token tensors in, per-token hidden states out.
///
/// `output` arrives zeroed and sized `[batch_count, sequence_length,
/// hidden_dim]`. Implementations fill it completely or fail; they never
/// retry. Concurrent calls are only as safe as the wrapped runtime makes
/// them, so implementations must be `Sync` on their own terms.
pub trait InferenceBackend: Send + Sync {
    fn run(&self, batch: &TokenizedBatch, output: ArrayViewMut3<'_, f32>)
        -> Result<(), EmbedError>;
}

/// Session construction knobs. Execution-provider choice stays with the
/// caller who builds the session; this only covers CPU-side tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub intra_threads: Option<usize>,
}

/// [`InferenceBackend`] over an already-open `ort` session.
pub struct OrtBackend {
    // `Session::run` takes `&mut self`.
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_name: String,
}

impl OrtBackend {
    /// Opens `model_path` with level-3 graph optimizations.
    pub fn from_file(model_path: &Path, options: SessionOptions) -> Result<Self, EmbedError> {
        let mut builder = Session::builder()
            .map_err(|e| EmbedError::Inference(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbedError::Inference(format!("optimization level: {e}")))?;
        if let Some(threads) = options.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| EmbedError::Inference(format!("intra threads: {e}")))?;
        }
        let session = builder.commit_from_file(model_path).map_err(|e| {
            EmbedError::Inference(format!("load model from {}: {e}", model_path.display()))
        })?;
        Self::new(session)
    }

    /// Wraps a session configured elsewhere (execution providers, memory
    /// pattern, ...).
    pub fn new(session: Session) -> Result<Self, EmbedError> {
        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        if input_names.is_empty() {
            return Err(EmbedError::Inference(
                "model did not declare any inputs".into(),
            ));
        }
        for name in &input_names {
            if !matches!(
                name.as_str(),
                "input_ids" | "attention_mask" | "token_type_ids"
            ) {
                return Err(EmbedError::Inference(format!(
                    "unsupported model input '{name}'"
                )));
            }
        }
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| EmbedError::Inference("model declared no outputs".into()))?;

        debug!(inputs = ?input_names, output = %output_name, "ort_session_ready");

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_name,
        })
    }

    fn session_inputs(
        &self,
        batch: &TokenizedBatch,
    ) -> Result<Vec<(Cow<'static, str>, SessionInputValue<'static>)>, EmbedError> {
        let mut inputs = Vec::with_capacity(self.input_names.len());
        for name in &self.input_names {
            let source = match name.as_str() {
                "input_ids" => batch.input_ids(),
                "attention_mask" => batch.attention_mask(),
                _ => batch.token_type_ids(),
            };
            let tensor = Tensor::from_array(source.to_owned())
                .map_err(|e| EmbedError::Inference(format!("tensor `{name}`: {e}")))?;
            inputs.push((Cow::Owned(name.clone()), SessionInputValue::from(tensor)));
        }
        Ok(inputs)
    }
}

impl InferenceBackend for OrtBackend {
    fn run(
        &self,
        batch: &TokenizedBatch,
        mut output: ArrayViewMut3<'_, f32>,
    ) -> Result<(), EmbedError> {
        let expected = [
            batch.batch_count(),
            batch.sequence_length(),
            output.dim().2,
        ];
        if output.shape() != expected {
            return Err(EmbedError::shape(&expected, output.shape()));
        }

        let inputs = self.session_inputs(batch)?;
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(inputs)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let hidden = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        let actual = hidden.shape().to_vec();
        let hidden = hidden
            .into_dimensionality::<Ix3>()
            .map_err(|_| EmbedError::shape(&expected, &actual))?;
        if hidden.shape() != expected {
            return Err(EmbedError::shape(&expected, &actual));
        }

        output.assign(&hidden);
        Ok(())
    }
}
