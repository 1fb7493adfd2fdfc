#[derive(thiserror::Error, Debug)]
pub enum PostprocessError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PostprocessError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PostprocessError::InvalidInput(msg.into())
    }
}
