use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Benchmark cancelled")]
    Cancelled,

    #[error("Exercise '{name}' has no attempts left (max {max_attempts})")]
    AttemptsExhausted { name: String, max_attempts: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BenchError>;
