pub mod category;
pub mod post;

use axum::{
    Router,
    routing::{get, post},
};
use serde_json::json;

use crate::AppState;
use crate::result::ApiResult;

/// 挂在 API 前缀下的全部路由
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/posts", get(post::list_posts).post(post::create_post))
        .route("/posts/trending", get(post::trending_posts))
        .route("/posts/featured", get(post::featured_posts))
        .route(
            "/posts/{slug}",
            get(post::get_post)
                .put(post::update_post)
                .delete(post::delete_post),
        )
        .route("/posts/{slug}/publish", post(post::toggle_publish))
        .route("/posts/{slug}/views", post(post::record_view))
        .route(
            "/categories",
            get(category::list_categories).post(category::create_category),
        )
        .route(
            "/categories/{slug}",
            get(category::get_category).delete(category::delete_category),
        )
}

pub async fn health() -> axum::Json<ApiResult<serde_json::Value>> {
    ApiResult::success(json!({ "status": "ok" }))
}
