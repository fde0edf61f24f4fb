use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Failures surfaced by the collection pipeline and the rendering feed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("render timeout: {what} not ready after {secs}s")]
    RenderTimeout { what: String, secs: u64 },
    #[error("rendering session error: {0}")]
    Session(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("pagination stopped at the {max_pages}-page ceiling while the source still reported more pages")]
    PaginationLimitExceeded { max_pages: u32 },
}

impl PipelineError {
    /// Message safe to hand to the caller of the pipeline. Internal detail
    /// (URLs, status codes, CDP errors) stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Transport(_) => {
                "Could not reach the product API. Check the network connection.".into()
            }
            PipelineError::Decode(_) => "The product API returned an unexpected response.".into(),
            PipelineError::RenderTimeout { .. } => {
                "The storefront page did not finish loading in time.".into()
            }
            PipelineError::Session(_) => "The headless browser could not be started.".into(),
            PipelineError::Config(msg) => format!("Invalid parameters: {}", msg),
            PipelineError::PaginationLimitExceeded { max_pages } => format!(
                "Stopped after {} pages; the product API kept reporting more pages.",
                max_pages
            ),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(e: config::ConfigError) -> Self {
        PipelineError::Config(e.to_string())
    }
}
