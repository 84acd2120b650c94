use axum::Json;
use serde::{Deserialize, Serialize};

/// 接口统一返回结构，成功时 code 为 0
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResult<T: Serialize> {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<T>,
}

impl<T: Serialize> ApiResult<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            code: 0,
            content: Some(data),
        })
    }
}
