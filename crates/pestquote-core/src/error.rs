use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// The quote row was written but a later stage failed. Retrying the whole
    /// pricing call repairs it through the update path.
    #[error("quote {quote_id} for lead {lead_id} was saved but {stage} failed: {cause:#}")]
    PartialFailure {
        lead_id: Uuid,
        quote_id: Uuid,
        stage: &'static str,
        cause: anyhow::Error,
    },

    #[error("{stage} failed: {cause:#}")]
    Unavailable {
        stage: &'static str,
        cause: anyhow::Error,
    },
}

impl QuoteError {
    pub fn unavailable(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |cause| Self::Unavailable { stage, cause }
    }

    pub fn partial(
        lead_id: Uuid,
        quote_id: Uuid,
        stage: &'static str,
    ) -> impl FnOnce(anyhow::Error) -> Self {
        move |cause| Self::PartialFailure {
            lead_id,
            quote_id,
            stage,
            cause,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PartialFailure { .. } | Self::Unavailable { .. })
    }
}
