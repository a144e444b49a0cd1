use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThrowContextError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Throw context capture is already initialized with a different configuration")]
    AlreadyInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Sink error: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, ThrowContextError>;
