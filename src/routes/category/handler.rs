use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::content::NewCategory;
use crate::error::AppError;
use crate::result::ApiResult;

#[axum::debug_handler]
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let categories = state.content.list_categories().await?;
    Ok(ApiResult::success(categories))
}

#[axum::debug_handler]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.content.category_by_slug(&slug).await?;
    Ok(ApiResult::success(category))
}

#[axum::debug_handler]
pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<NewCategory>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.content.create_category(req).await?;
    tracing::info!(slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, ApiResult::success(category)))
}

#[axum::debug_handler]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.content.delete_category(&slug).await?;
    tracing::info!(slug = %category.slug, "category deleted");
    Ok(ApiResult::success(category))
}
