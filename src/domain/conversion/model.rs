use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted conversion: archived source document, synthesized audio, and
/// the metadata shown in history listings.
#[derive(Debug, Clone, FromRow)]
pub struct Conversion {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub input_type: String,
    pub original_filename: Option<String>,
    pub source_path: String,
    pub content_preview: String,
    pub content_length: i64,
    pub voice: String,
    pub speed: f64,
    pub audio_path: String,
    pub audio_duration: Option<f64>,
    pub audio_size: i64,
    pub full_text: String,
}

impl Conversion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_type: &str,
        original_filename: Option<String>,
        source_path: String,
        full_text: String,
        voice: String,
        speed: f64,
        audio_path: String,
        audio_duration: Option<f64>,
        audio_size: i64,
    ) -> Self {
        let content_preview: String = full_text.chars().take(200).collect();
        let content_length = full_text.chars().count() as i64;
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            input_type: input_type.to_string(),
            original_filename,
            source_path,
            content_preview,
            content_length,
            voice,
            speed,
            audio_path,
            audio_duration,
            audio_size,
            full_text,
        }
    }
}

/// History listing entry; omits the full text.
#[derive(Debug, Serialize)]
pub struct ConversionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub input_type: String,
    pub original_filename: Option<String>,
    pub content_preview: String,
    pub content_length: i64,
    pub voice: String,
    pub speed: f64,
    pub audio_duration: Option<f64>,
    pub audio_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

impl ConversionSummary {
    pub fn from_conversion(conversion: &Conversion, include_full_text: bool) -> Self {
        Self {
            id: conversion.id.clone(),
            created_at: conversion.created_at,
            input_type: conversion.input_type.clone(),
            original_filename: conversion.original_filename.clone(),
            content_preview: conversion.content_preview.clone(),
            content_length: conversion.content_length,
            voice: conversion.voice.clone(),
            speed: conversion.speed,
            audio_duration: conversion.audio_duration,
            audio_size: conversion.audio_size,
            full_text: include_full_text.then(|| conversion.full_text.clone()),
        }
    }
}
