use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{TrendingQuery, ViewCount};
use crate::AppState;
use crate::content::{NewPost, PostFilter, PostUpdate};
use crate::error::AppError;
use crate::result::ApiResult;

#[axum::debug_handler]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let posts = state.content.list_posts(filter).await?;
    Ok(ApiResult::success(posts))
}

#[axum::debug_handler]
pub async fn trending_posts(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let posts = state.content.trending_posts(query.limit()).await?;
    Ok(ApiResult::success(posts))
}

#[axum::debug_handler]
pub async fn featured_posts(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let posts = state.content.featured_posts().await?;
    Ok(ApiResult::success(posts))
}

#[axum::debug_handler]
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = state.content.post_by_slug(&slug).await?;
    Ok(ApiResult::success(post))
}

#[axum::debug_handler]
pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<NewPost>,
) -> Result<impl IntoResponse, AppError> {
    let post = state.content.create_post(req).await?;
    tracing::info!(slug = %post.slug, "post created");
    Ok((StatusCode::CREATED, ApiResult::success(post)))
}

#[axum::debug_handler]
pub async fn update_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<PostUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let post = state.content.update_post(&slug, req).await?;
    Ok(ApiResult::success(post))
}

#[axum::debug_handler]
pub async fn delete_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = state.content.delete_post(&slug).await?;
    tracing::info!(slug = %post.slug, "post deleted");
    Ok(ApiResult::success(post))
}

#[axum::debug_handler]
pub async fn toggle_publish(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = state.content.toggle_publish(&slug).await?;
    Ok(ApiResult::success(post))
}

#[axum::debug_handler]
pub async fn record_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let views = state.content.record_view(&slug).await?;
    Ok(ApiResult::success(ViewCount { views }))
}
