use async_trait::async_trait;

/// One synthesis request: the chunk text plus delivery parameters.
#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub voice: &'a str,
    /// Playback speed multiplier, within [0.25, 4.0]
    pub speed: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// Missing or unusable endpoint credentials. Never retried.
    #[error("speech endpoint not configured: {0}")]
    Configuration(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned status {status}: {body}")]
    Endpoint { status: u16, body: String },
}

/// Repository for speech synthesis.
/// Abstracts the underlying provider so the adaptive-retry pipeline never
/// touches transport details.
///
/// Implementations return raw MP3 bytes; output validation (size, container
/// signature) is the caller's responsibility.
#[async_trait]
pub trait SpeechRepository: Send + Sync {
    /// Synthesize one chunk of text to MP3 audio.
    ///
    /// # Errors
    /// Returns error if the provider is unreachable, rejects the request, or
    /// is not configured.
    async fn synthesize(&self, request: SpeechRequest<'_>) -> Result<Vec<u8>, SpeechError>;
}
