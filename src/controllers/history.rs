use axum::{
    body::Body,
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::{
    domain::conversion::{Conversion, ConversionSummary},
    error::{AppError, AppResult},
    infrastructure::{repositories::ConversionRepository, storage::StorageQuota},
};

const PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    #[serde(default)]
    pub download: Option<String>,
}

pub struct HistoryController {
    conversion_repo: Arc<ConversionRepository>,
    storage: Arc<StorageQuota>,
}

impl HistoryController {
    pub fn new(conversion_repo: Arc<ConversionRepository>, storage: Arc<StorageQuota>) -> Self {
        Self {
            conversion_repo,
            storage,
        }
    }

    async fn find_conversion(&self, id: &str) -> AppResult<Conversion> {
        self.conversion_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversion not found".to_string()))
    }

    /// GET /api/result/:id - completed conversion metadata
    pub async fn get_result(
        State(controller): State<Arc<HistoryController>>,
        AxumPath(id): AxumPath<String>,
    ) -> AppResult<Json<Value>> {
        let conversion = controller.find_conversion(&id).await?;

        Ok(Json(json!({
            "id": conversion.id,
            "audio_url": format!("/api/audio/{}", conversion.id),
            "audio_duration": conversion.audio_duration,
            "created_at": conversion.created_at,
        })))
    }

    /// GET /api/audio/:id - stream or download the synthesized audio
    pub async fn get_audio(
        State(controller): State<Arc<HistoryController>>,
        AxumPath(id): AxumPath<String>,
        Query(query): Query<AudioQuery>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let conversion = controller.find_conversion(&id).await?;

        let audio_path = Path::new(&conversion.audio_path);
        if !audio_path.exists() {
            return Err(AppError::NotFound("Audio file not found".to_string()));
        }
        let audio = std::fs::read(audio_path)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("audio/mpeg"),
        );
        if query.download.as_deref() == Some("1") {
            let short_id: String = conversion.id.chars().take(8).collect();
            let disposition = format!("attachment; filename=\"docutape-{short_id}.mp3\"");
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .map_err(|e| AppError::Internal(e.to_string()))?,
            );
        }

        Ok((StatusCode::OK, headers, Body::from(audio)))
    }

    /// GET /api/history - paged listing, optionally full-text filtered
    pub async fn get_history(
        State(controller): State<Arc<HistoryController>>,
        Query(query): Query<HistoryQuery>,
    ) -> AppResult<Json<Value>> {
        let page = query.page.unwrap_or(1).max(1);
        let offset = (page - 1) * PAGE_SIZE;

        let search_term = query
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        let conversions = match search_term {
            Some(term) => {
                controller
                    .conversion_repo
                    .search(
                        &term,
                        query.from.as_deref(),
                        query.to.as_deref(),
                        PAGE_SIZE,
                        offset,
                    )
                    .await?
            }
            None => controller.conversion_repo.list(PAGE_SIZE, offset).await?,
        };

        let items: Vec<ConversionSummary> = conversions
            .iter()
            .map(|conversion| ConversionSummary::from_conversion(conversion, false))
            .collect();

        Ok(Json(json!({ "items": items, "page": page })))
    }

    /// GET /api/history/:id - one entry, including the full text
    pub async fn get_history_detail(
        State(controller): State<Arc<HistoryController>>,
        AxumPath(id): AxumPath<String>,
    ) -> AppResult<Json<ConversionSummary>> {
        let conversion = controller.find_conversion(&id).await?;
        Ok(Json(ConversionSummary::from_conversion(&conversion, true)))
    }

    /// DELETE /api/history/:id - remove the entry and its files
    pub async fn delete_history(
        State(controller): State<Arc<HistoryController>>,
        AxumPath(id): AxumPath<String>,
    ) -> AppResult<Json<Value>> {
        let conversion = controller.find_conversion(&id).await?;

        controller.storage.delete_artifacts(&conversion);
        controller.conversion_repo.delete(&conversion.id).await?;

        tracing::info!(conversion_id = %conversion.id, "History entry deleted");

        Ok(Json(json!({ "success": true })))
    }
}
