//! End-to-end conversion pipeline: normalize, chunk, repair, synthesize with
//! adaptive retry, concatenate, measure.

use lofty::prelude::*;
use lofty::probe::Probe;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::chunker::{char_len, chunk_text};
use super::error::ConversionError;
use super::jobs::JobRegistry;
use super::model::Conversion;
use super::normalizer::normalize;
use super::repair::repair_chunks;
use crate::infrastructure::config::Config;
use crate::infrastructure::repositories::{
    ConversionRepository, SpeechError, SpeechRepository, SpeechRequest,
};
use crate::infrastructure::storage::StorageQuota;

/// Attempts per synthesis call before the current ladder step is abandoned
const MAX_RETRIES: u32 = 3;
/// Base delay between attempts; backoff grows linearly from here
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Anything smaller cannot be real audio
const MIN_AUDIO_BYTES: u64 = 100;
/// Ceilings tried between the carried ceiling and the configured minimum
const FALLBACK_CHUNK_SIZES: [usize; 2] = [2000, 1000];
/// Duration estimate when the audio container cannot be probed
const CHARACTERS_PER_MINUTE: f64 = 1000.0;

/// Everything a submission carries into its background worker.
pub struct SubmitRequest {
    pub text: String,
    pub voice: String,
    pub speed: f64,
    pub input_type: String,
    pub original_filename: Option<String>,
    pub source_path: PathBuf,
}

pub struct ConversionService {
    config: Arc<Config>,
    speech_repo: Arc<dyn SpeechRepository>,
    conversion_repo: Arc<ConversionRepository>,
    storage: Arc<StorageQuota>,
    jobs: Arc<JobRegistry>,
}

impl ConversionService {
    pub fn new(
        config: Arc<Config>,
        speech_repo: Arc<dyn SpeechRepository>,
        conversion_repo: Arc<ConversionRepository>,
        storage: Arc<StorageQuota>,
        jobs: Arc<JobRegistry>,
    ) -> Self {
        Self {
            config,
            speech_repo,
            conversion_repo,
            storage,
            jobs,
        }
    }

    /// Register a job and start its worker. Returns immediately with the job
    /// id; callers poll the registry for progress and outcome.
    pub fn submit(self: &Arc<Self>, request: SubmitRequest) -> Uuid {
        // Reap stale entries before admitting a new one
        let purged = self.jobs.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Reaped expired job entries");
        }

        let job_id = Uuid::new_v4();
        self.jobs.create(job_id);

        tracing::info!(
            job_id = %job_id,
            voice = %request.voice,
            speed = request.speed,
            text_length = request.text.len(),
            input_type = %request.input_type,
            "Conversion job submitted"
        );

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_job(job_id, request).await;
        });

        job_id
    }

    async fn run_job(&self, job_id: Uuid, request: SubmitRequest) {
        let incoming_estimate = (request.text.len() as u64).saturating_mul(10);
        if let Err(e) = self.storage.ensure_capacity(incoming_estimate).await {
            self.abort_job(job_id, &request, format!("Storage cleanup failed: {e}"));
            return;
        }

        let audio_path = self.config.audio_dir().join(format!("{job_id}.mp3"));
        let jobs = Arc::clone(&self.jobs);
        let progress =
            move |current: usize, total: usize| jobs.update_progress(job_id, current, total);

        let duration = match self
            .convert_text(
                &request.text,
                &request.voice,
                request.speed,
                &audio_path,
                &progress,
            )
            .await
        {
            Ok(duration) => duration,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Conversion job failed");
                self.abort_job(job_id, &request, e.to_string());
                return;
            }
        };

        let audio_size = match std::fs::metadata(&audio_path) {
            Ok(metadata) => metadata.len() as i64,
            Err(e) => {
                self.abort_job(job_id, &request, format!("Audio file missing: {e}"));
                return;
            }
        };

        let conversion = Conversion::new(
            &request.input_type,
            request.original_filename.clone(),
            request.source_path.display().to_string(),
            request.text.clone(),
            request.voice.clone(),
            request.speed,
            audio_path.display().to_string(),
            Some(duration),
            audio_size,
        );

        match self.conversion_repo.insert(&conversion).await {
            Ok(()) => {
                self.jobs.complete(job_id, &conversion.id);
                tracing::info!(
                    job_id = %job_id,
                    conversion_id = %conversion.id,
                    duration_seconds = duration,
                    audio_size,
                    "Conversion job completed"
                );
            }
            Err(e) => {
                let _ = std::fs::remove_file(&audio_path);
                self.abort_job(job_id, &request, format!("Failed to store conversion: {e}"));
            }
        }
    }

    /// Mark a job failed and drop its archived source so a dead job leaves no
    /// files behind.
    fn abort_job(&self, job_id: Uuid, request: &SubmitRequest, message: String) {
        self.jobs.fail(job_id, message);
        if request.source_path.exists() {
            if let Err(e) = std::fs::remove_file(&request.source_path) {
                tracing::warn!(
                    path = %request.source_path.display(),
                    error = %e,
                    "Failed to remove source of failed job"
                );
            }
        }
    }

    /// Run the whole pipeline for one text and write the final audio to
    /// `output_path`. Returns the measured duration in seconds.
    ///
    /// Chunk synthesis is strictly sequential; the audio segments must be
    /// concatenated in reading order. Temporary per-chunk files are removed
    /// on every exit path.
    pub async fn convert_text<F>(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
        output_path: &Path,
        progress: &F,
    ) -> Result<f64, ConversionError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let normalized = normalize(text);
        let chunks = chunk_text(&normalized, self.config.initial_chunk_size);
        if chunks.is_empty() {
            return Err(ConversionError::Validation(
                "no text to convert after preprocessing".to_string(),
            ));
        }

        // Every chunk that reaches the endpoint is speakable and bounded
        let chunks = repair_chunks(chunks, self.config.initial_chunk_size)?;
        let total = chunks.len();

        tracing::info!(
            total_chunks = total,
            text_length = char_len(&normalized),
            initial_ceiling = self.config.initial_chunk_size,
            "Starting chunked synthesis"
        );

        let mut artifacts: Vec<NamedTempFile> = Vec::with_capacity(total);
        let mut last_successful = self.config.initial_chunk_size;

        for (index, chunk) in chunks.iter().enumerate() {
            progress(index + 1, total);

            let artifact = tempfile::Builder::new().suffix(".mp3").tempfile()?;
            let mut converted = false;

            for size in self.size_ladder(last_successful) {
                let success = if char_len(chunk) <= size {
                    self.synthesize_with_retry(chunk, voice, speed, artifact.path())
                        .await?
                } else {
                    // Chunk exceeds this ceiling: synthesize it piecewise
                    self.synthesize_in_pieces(chunk, size, voice, speed, artifact.path())
                        .await?
                };

                if success {
                    last_successful = size;
                    converted = true;
                    break;
                }

                tracing::warn!(
                    chunk = index + 1,
                    total,
                    ceiling = size,
                    "Ladder step exhausted, dropping to a smaller ceiling"
                );
            }

            if !converted {
                return Err(ConversionError::Synthesis {
                    chunk: index + 1,
                    total,
                });
            }

            artifacts.push(artifact);
        }

        // Concatenate chunk audio in emission order
        let mut output = Vec::new();
        for artifact in &artifacts {
            let bytes = std::fs::read(artifact.path())?;
            output.extend_from_slice(&bytes);
        }
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output_path, &output)?;

        // Chunk artifacts are deleted here; the RAII handles also cover every
        // early return above
        drop(artifacts);

        let duration = measure_duration(output_path).unwrap_or_else(|| {
            let spoken_chars: usize = chunks.iter().map(|chunk| char_len(chunk)).sum();
            estimate_duration(spoken_chars)
        });

        tracing::info!(
            chunks = total,
            audio_size = output.len(),
            duration_seconds = duration,
            "Synthesis finished"
        );

        Ok(duration)
    }

    /// Decreasing ceilings to try for one chunk: the carried last-successful
    /// ceiling first, then the fixed fallbacks, ending at the configured
    /// minimum.
    fn size_ladder(&self, last_successful: usize) -> Vec<usize> {
        let mut ladder = vec![last_successful];
        let mut current = last_successful;
        for size in FALLBACK_CHUNK_SIZES
            .into_iter()
            .chain([self.config.min_chunk_size])
        {
            if size < current {
                ladder.push(size);
                current = size;
            }
        }
        ladder
    }

    /// One synthesis call with the retry budget. `Ok(false)` means the budget
    /// is exhausted; configuration problems abort immediately instead of
    /// burning retries.
    async fn synthesize_with_retry(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
        output_path: &Path,
    ) -> Result<bool, ConversionError> {
        for attempt in 1..=MAX_RETRIES {
            match self
                .speech_repo
                .synthesize(SpeechRequest { text, voice, speed })
                .await
            {
                Ok(bytes) => match std::fs::write(output_path, &bytes) {
                    Ok(()) if is_valid_audio_file(output_path) => return Ok(true),
                    Ok(()) => {
                        tracing::warn!(
                            attempt,
                            audio_size = bytes.len(),
                            "Endpoint returned unusable audio"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "Failed to write chunk audio");
                    }
                },
                Err(SpeechError::Configuration(message)) => {
                    return Err(ConversionError::Configuration(message));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Synthesis attempt failed");
                }
            }

            if attempt < MAX_RETRIES {
                tokio::time::sleep(RETRY_DELAY * attempt).await;
            }
        }

        Ok(false)
    }

    /// Re-chunk at a smaller ceiling and synthesize the pieces one by one,
    /// concatenating their audio in order into `output_path`.
    async fn synthesize_in_pieces(
        &self,
        chunk: &str,
        ceiling: usize,
        voice: &str,
        speed: f64,
        output_path: &Path,
    ) -> Result<bool, ConversionError> {
        let pieces = chunk_text(chunk, ceiling);
        if pieces.is_empty() {
            return Ok(false);
        }

        let mut combined: Vec<u8> = Vec::new();
        for piece in &pieces {
            let scratch = tempfile::Builder::new().suffix(".mp3").tempfile()?;
            if !self
                .synthesize_with_retry(piece, voice, speed, scratch.path())
                .await?
            {
                return Ok(false);
            }
            combined.extend_from_slice(&std::fs::read(scratch.path())?);
        }

        std::fs::write(output_path, &combined)?;
        Ok(is_valid_audio_file(output_path))
    }
}

/// Accept synthesized output only if the file exists, is not degenerately
/// small, and starts with an MP3 container signature (ID3 tag or MPEG frame
/// sync).
fn is_valid_audio_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if metadata.len() < MIN_AUDIO_BYTES {
        return false;
    }
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut header = [0u8; 3];
    if file.read_exact(&mut header).is_err() {
        return false;
    }
    &header == b"ID3" || header[..2] == [0xFF, 0xFB]
}

fn measure_duration(path: &Path) -> Option<f64> {
    let tagged_file = Probe::open(path).ok()?.read().ok()?;
    let duration = tagged_file.properties().duration().as_secs_f64();
    (duration > 0.0).then_some(duration)
}

fn estimate_duration(spoken_chars: usize) -> f64 {
    spoken_chars as f64 / CHARACTERS_PER_MINUTE * 60.0
}
