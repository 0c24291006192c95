use thiserror::Error;

/// Failure kinds of a single relay request or of startup bootstrap.
///
/// The pipeline branches on these: search and summarization failures degrade
/// to a weaker answer, model failures abort the reply, bootstrap failures are
/// fatal or logged depending on the stage.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("model output did not match the answer schema: {0}")]
    MalformedModelOutput(String),

    #[error("model request failed: {0}")]
    ModelUnavailable(String),

    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("tunnel setup failed: {0}")]
    TunnelSetupFailed(String),

    #[error("webhook registration failed: {0}")]
    RegistrationFailed(String),

    #[error("reply failed: {0}")]
    ReplyFailed(String),
}
