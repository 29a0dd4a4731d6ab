use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::processor::MediaProcessor;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Shared, read-only request context.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<dyn MediaProcessor>,
    pub output_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub request_timeout: Duration,
    /// Base for returned links; `None` derives it from the Host header.
    pub public_url: Option<String>,
}

impl AppState {
    pub fn new(
        processor: Arc<dyn MediaProcessor>,
        output_dir: PathBuf,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            processor,
            output_dir,
            staging_dir,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            public_url: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_public_url(mut self, url: Option<String>) -> Self {
        self.public_url = url.map(|u| u.trim_end_matches('/').to_string());
        self
    }
}
