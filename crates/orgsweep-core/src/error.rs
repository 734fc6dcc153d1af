use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("malformed audit log event on line {line}: {reason}")]
    MalformedEvent { line: usize, reason: String },

    #[error("invalid visibility '{0}': expected public, private, or internal")]
    InvalidVisibility(String),

    #[error("GitHub API request to {path} failed with status {status}")]
    Api { path: String, status: u16 },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;
