use super::speech_repository::{SpeechError, SpeechRepository, SpeechRequest};
use async_trait::async_trait;

/// Speech synthesis over an OpenAI-compatible `/v1/audio/speech` endpoint
/// (LiteLLM, Kokoro-FastAPI, OpenAI itself).
pub struct HttpSpeechRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpSpeechRepository {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint_url(&self) -> String {
        format!("{}/v1/audio/speech", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechRepository for HttpSpeechRepository {
    async fn synthesize(&self, request: SpeechRequest<'_>) -> Result<Vec<u8>, SpeechError> {
        if self.api_key.is_empty() {
            return Err(SpeechError::Configuration(
                "SPEECH_API_KEY is not set".to_string(),
            ));
        }

        tracing::debug!(
            model = %self.model,
            voice = request.voice,
            speed = request.speed,
            text_length = request.text.len(),
            "Calling speech endpoint"
        );

        let body = serde_json::json!({
            "model": self.model,
            "input": request.text,
            "voice": request.voice,
            "speed": request.speed,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            tracing::warn!(
                status = status.as_u16(),
                body = %body,
                "Speech endpoint rejected request"
            );
            return Err(SpeechError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        tracing::debug!(audio_size = audio.len(), "Speech audio received");

        Ok(audio.to_vec())
    }
}
