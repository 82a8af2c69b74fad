use thiserror::Error;

pub type FunnelResult<T> = Result<T, FunnelError>;

#[derive(Error, Debug)]
pub enum FunnelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid funnel transition: {0}")]
    InvalidTransition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FunnelError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
