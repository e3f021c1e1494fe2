use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::AssetType;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTypeView {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AssetType> for AssetTypeView {
    fn from(asset_type: AssetType) -> Self {
        Self {
            id: asset_type.id,
            name: asset_type.name,
            symbol: asset_type.symbol,
            description: asset_type.description,
            is_active: asset_type.is_active,
            created_at: asset_type.created_at,
            updated_at: asset_type.updated_at,
        }
    }
}

pub async fn list_asset_types(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let asset_types = queries::list_asset_types(&state.db).await?;
    let views: Vec<AssetTypeView> = asset_types.into_iter().map(AssetTypeView::from).collect();
    Ok(Json(ApiResponse::new(views)))
}
