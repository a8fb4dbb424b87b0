use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BenchError, Result};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_BASE: &str = "https://openrouter.ai/api/v1";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    OpenAi,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama",
            Provider::OpenAi => "OpenAI-compatible",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Ollama => DEFAULT_OLLAMA_HOST,
            Provider::OpenAi => DEFAULT_OPENAI_BASE,
        }
    }
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_true() -> bool {
    true
}

/// Settings for one benchmark run. Embedded verbatim in saved reports, so it
/// never carries credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchConfig {
    pub model_id: String,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-operation limit for generated code. `None` runs unbounded.
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub save_results: bool,
    #[serde(default = "default_true")]
    pub generate_html: bool,
    #[serde(default = "default_true")]
    pub verbose: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model_id: String::new(),
            provider: Provider::default(),
            base_url: None,
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            execution_timeout_ms: None,
            python: default_python(),
            output_dir: None,
            save_results: default_true(),
            generate_html: default_true(),
            verbose: default_true(),
        }
    }
}

impl BenchConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(BenchError::Config("model id must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(BenchError::Config("max attempts must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(BenchError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(BenchError::Config("request timeout must be positive".into()));
        }
        if self.execution_timeout_ms == Some(0) {
            return Err(BenchError::Config("execution timeout must be positive".into()));
        }
        Ok(())
    }
}
