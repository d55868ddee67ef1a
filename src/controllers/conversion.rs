use axum::{
    extract::{Multipart, Path as AxumPath, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::conversion::{ConversionService, JobRegistry, JobStatus, SubmitRequest},
    error::{AppError, AppResult},
    infrastructure::{
        config::{Config, SPEEDS, VOICES},
        extract::{extract_text, is_supported_extension},
    },
};

/// Response for POST /api/convert
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Response for GET /api/status/:job_id
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    pub progress: u8,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub error: Option<String>,
    pub result_id: Option<String>,
}

pub struct ConversionController {
    service: Arc<ConversionService>,
    jobs: Arc<JobRegistry>,
    config: Arc<Config>,
}

impl ConversionController {
    pub fn new(
        service: Arc<ConversionService>,
        jobs: Arc<JobRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            service,
            jobs,
            config,
        }
    }

    /// GET /api/voices - the fixed voice and speed lists
    pub async fn get_voices() -> Json<Value> {
        Json(json!({ "voices": VOICES, "speeds": SPEEDS }))
    }

    /// POST /api/convert - submit a text or file for conversion
    pub async fn start_conversion(
        State(controller): State<Arc<ConversionController>>,
        multipart: Multipart,
    ) -> AppResult<Json<SubmitResponse>> {
        let fields = SubmitFields::collect(multipart).await?;
        let config = &controller.config;

        std::fs::create_dir_all(config.sources_dir())?;

        // Archive the source, then extract its text
        let (text, input_type, original_filename, source_path) = match fields.file {
            Some((filename, data)) => {
                let extension = Path::new(&filename)
                    .extension()
                    .and_then(OsStr::to_str)
                    .map(str::to_lowercase)
                    .unwrap_or_default();
                if !is_supported_extension(&extension) {
                    return Err(AppError::BadRequest(
                        "Unsupported file type. Use .txt, .md, or .pdf".to_string(),
                    ));
                }

                let source_path = config
                    .sources_dir()
                    .join(format!("{}.{extension}", Uuid::new_v4()));
                std::fs::write(&source_path, &data)?;

                match extract_text(&source_path) {
                    Ok(text) => (text, "upload", Some(filename), source_path),
                    Err(e) => {
                        let _ = std::fs::remove_file(&source_path);
                        return Err(AppError::BadRequest(format!("Failed to extract text: {e}")));
                    }
                }
            }
            None => match fields
                .text
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
            {
                Some(text) => {
                    let source_path = config
                        .sources_dir()
                        .join(format!("{}.txt", Uuid::new_v4()));
                    std::fs::write(&source_path, &text)?;
                    (text, "paste", None, source_path)
                }
                None => {
                    return Err(AppError::BadRequest("No text or file provided".to_string()));
                }
            },
        };

        if text.trim().is_empty() {
            let _ = std::fs::remove_file(&source_path);
            return Err(AppError::BadRequest("Empty content".to_string()));
        }

        let voice = fields
            .voice
            .unwrap_or_else(|| config.default_voice.clone());
        if !config.is_known_voice(&voice) {
            let _ = std::fs::remove_file(&source_path);
            return Err(AppError::BadRequest(format!("Invalid voice: {voice}")));
        }

        let speed = match fields.speed {
            Some(raw) => match raw.parse::<f64>() {
                Ok(speed) => speed,
                Err(_) => {
                    let _ = std::fs::remove_file(&source_path);
                    return Err(AppError::BadRequest("Invalid speed value".to_string()));
                }
            },
            None => config.default_speed,
        };
        if !(0.25..=4.0).contains(&speed) {
            let _ = std::fs::remove_file(&source_path);
            return Err(AppError::BadRequest(
                "Speed must be between 0.25 and 4.0".to_string(),
            ));
        }

        let content_length = text.chars().count();
        let warning = (content_length > config.large_input_warning)
            .then(|| "Large input may take a while to process".to_string());

        let job_id = controller.service.submit(SubmitRequest {
            text,
            voice,
            speed,
            input_type: input_type.to_string(),
            original_filename,
            source_path,
        });

        Ok(Json(SubmitResponse {
            job_id,
            content_length,
            warning,
        }))
    }

    /// GET /api/status/:job_id - poll job progress
    pub async fn get_status(
        State(controller): State<Arc<ConversionController>>,
        AxumPath(job_id): AxumPath<String>,
    ) -> AppResult<Json<StatusResponse>> {
        let job_id = Uuid::parse_str(&job_id)
            .map_err(|_| AppError::NotFound("Job not found".to_string()))?;
        let job = controller
            .jobs
            .snapshot(&job_id)
            .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

        Ok(Json(StatusResponse {
            status: job.status,
            progress: job.progress,
            current_chunk: job.current_chunk,
            total_chunks: job.total_chunks,
            error: job.error,
            result_id: job.result_id,
        }))
    }
}

/// The multipart fields accepted by /api/convert
struct SubmitFields {
    file: Option<(String, Vec<u8>)>,
    text: Option<String>,
    voice: Option<String>,
    speed: Option<String>,
}

impl SubmitFields {
    async fn collect(mut multipart: Multipart) -> AppResult<Self> {
        let mut fields = Self {
            file: None,
            text: None,
            voice: None,
            speed: None,
        };

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?;
                    if !filename.is_empty() {
                        fields.file = Some((filename, data.to_vec()));
                    }
                }
                "text" => {
                    fields.text = Some(field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Malformed form data: {e}"))
                    })?);
                }
                "voice" => {
                    fields.voice = Some(field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Malformed form data: {e}"))
                    })?);
                }
                "speed" => {
                    fields.speed = Some(field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Malformed form data: {e}"))
                    })?);
                }
                _ => {}
            }
        }

        Ok(fields)
    }
}
