/// Errors raised by the conversion pipeline. All of them are terminal for the
/// job they occur in; none of them crash the process.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// No speakable content survived chunk validation/repair. Raised before
    /// any synthesis call is made.
    #[error("no speakable content to convert: {0}")]
    Validation(String),

    /// A chunk exhausted the whole size ladder and retry budget.
    #[error("failed to convert chunk {chunk}/{total}")]
    Synthesis { chunk: usize, total: usize },

    /// Speech endpoint credentials are missing or unusable.
    #[error("speech endpoint not configured: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
