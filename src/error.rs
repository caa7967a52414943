use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetryError {
    #[error("GITHUB_REPOSITORY environment variable not set")]
    MissingRepository,

    #[error("failed to launch gh: {0}")]
    GhSpawn(#[source] std::io::Error),

    #[error("gh command failed: {stderr}")]
    GhCommand { stderr: String },

    #[error("malformed API response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RetryError>;
