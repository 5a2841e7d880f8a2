//! Engine configuration and YAML loading.
//!
//! ```yaml
//! version: "1.0"
//! model_name: "all-MiniLM-L6-v2"
//! model_dir: "./models/all-MiniLM-L6-v2"
//! embedding_dim: 384
//! chunk_size: 128
//! max_sequence_length: 512
//! sanitize: control_chars
//! failure_policy: report
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sanitize::SanitizePolicy;

/// Native output dimension of the MiniLM-class models this engine targets.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
/// Strings per streamed chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 128;
/// BERT position-embedding limit; longer inputs are truncated.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Errors that can occur when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// What happens to a chunk whose tokenization or inference fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Every input of the failed chunk yields its own error, so output count
    /// always matches input count. Eager generation returns the error.
    #[default]
    Report,
    /// The failed chunk contributes nothing and a warning is logged. Eager
    /// generation returns an empty result.
    Skip,
}

/// Runtime configuration for an [`EmbeddingEngine`](crate::EmbeddingEngine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedConfig {
    /// Configuration format version (`"1"` or `"1.0"`).
    #[serde(default = "default_version")]
    pub version: String,
    /// Friendly label surfaced through [`ModelMetadata`](crate::ModelMetadata).
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Directory laid out as `onnx/model.onnx` + `tokenizer.json`.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Explicit ONNX file, overriding the `model_dir` layout.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Explicit `tokenizer.json`, overriding the `model_dir` layout.
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
    /// Hidden size the model emits per token.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Strings per chunk for streaming generation.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Token budget per input; the tokenizer truncates past this.
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    #[serde(default)]
    pub sanitize: SanitizePolicy,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// ONNX Runtime intra-op threads. `None` keeps the runtime default.
    #[serde(default)]
    pub intra_threads: Option<usize>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            model_name: default_model_name(),
            model_dir: default_model_dir(),
            model_path: None,
            tokenizer_path: None,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            sanitize: SanitizePolicy::default(),
            failure_policy: FailurePolicy::default(),
            intra_threads: None,
        }
    }
}

impl EmbedConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: EmbedConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.version.as_str() {
            "1.0" | "1" => {}
            v => return Err(ConfigError::UnsupportedVersion(v.to_string())),
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::Validation(
                "embedding_dim must be greater than 0".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if self.max_sequence_length == 0 {
            return Err(ConfigError::Validation(
                "max_sequence_length must be greater than 0".into(),
            ));
        }
        if self.intra_threads == Some(0) {
            return Err(ConfigError::Validation(
                "intra_threads must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    /// ONNX file location: the explicit override, else `model_dir/onnx/model.onnx`.
    pub fn resolved_model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join("onnx").join("model.onnx"))
    }

    /// Tokenizer location: the explicit override, else `model_dir/tokenizer.json`.
    pub fn resolved_tokenizer_path(&self) -> PathBuf {
        self.tokenizer_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join("tokenizer.json"))
    }
}

/// Per-call knobs, mirroring what generic embedding clients pass along.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Requested output dimension. Must equal the model's native dimension
    /// when set.
    #[serde(default)]
    pub dimensions: Option<usize>,
}

impl GenerationOptions {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./models/all-MiniLM-L6-v2")
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_sequence_length() -> usize {
    DEFAULT_MAX_SEQUENCE_LENGTH
}
