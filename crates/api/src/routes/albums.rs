//! Read-only album lookup, so callers can watch stock move.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::AlbumId;
use serde::Serialize;
use store::CatalogStore;

use super::orders::{AppState, parse_id};
use crate::Backend;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct AlbumResponse {
    pub id: String,
    pub title: String,
    pub price_cents: i64,
    pub price: String,
    pub stock_quantity: u32,
}

/// GET /api/albums/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let album_id: AlbumId = parse_id(&id, "album id")?;
    let album = state
        .store()
        .get_album(album_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Album not found with id: {album_id}")))?;

    Ok(Json(AlbumResponse {
        id: album.id.to_string(),
        title: album.title,
        price_cents: album.price.cents(),
        price: album.price.to_string(),
        stock_quantity: album.stock_quantity,
    }))
}
