use thiserror::Error;

/// Why processing one item failed.
///
/// Variants carry the underlying cause for logs; [`PipelineError::detail`]
/// is the short message safe to show a client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Bad input: empty or corrupt image, degenerate frame, no frames.
    #[error("{0}")]
    InputValidation(String),
    /// The video container or stream could not be read.
    #[error("Error opening video file: {0}")]
    MediaOpen(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to record counts: {0}")]
    StorageWrite(String),
    #[error("failed to encode output: {0}")]
    Encode(String),
}

impl PipelineError {
    /// True for failures caused by the submitted media rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InputValidation(_) | PipelineError::MediaOpen(_)
        )
    }

    pub fn detail(&self) -> String {
        match self {
            PipelineError::InputValidation(message) => message.clone(),
            PipelineError::MediaOpen(_) => "Error opening video file".to_string(),
            PipelineError::Inference(_) => "Inference failed".to_string(),
            PipelineError::StorageWrite(_) => "Failed to record counts".to_string(),
            PipelineError::Encode(_) => "Failed to encode output".to_string(),
        }
    }

    pub(crate) fn media_open(e: Box<dyn std::error::Error>) -> Self {
        PipelineError::MediaOpen(e.to_string())
    }

    pub(crate) fn inference(e: Box<dyn std::error::Error>) -> Self {
        PipelineError::Inference(e.to_string())
    }

    pub(crate) fn storage(e: Box<dyn std::error::Error>) -> Self {
        PipelineError::StorageWrite(e.to_string())
    }

    pub(crate) fn encode(e: Box<dyn std::error::Error>) -> Self {
        PipelineError::Encode(e.to_string())
    }
}
