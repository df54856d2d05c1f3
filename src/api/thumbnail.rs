// 缩略图端点
//
// GET /thumbnail/*url
//
// 成功时返回转码后的 WebP 字节（带存储的 Content-Type），
// 失败时返回 JSON 封套，传输层状态码取封套的逻辑状态。

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use url::Url;

use super::AppState;
use crate::services::resolver::{LinkResponse, ResolveRequest};

pub async fn serve_thumbnail(
    State(state): State<AppState>,
    Path(raw_url): Path<String>,
) -> Response {
    let raw_url = raw_url.trim();

    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("缩略图链接无法解析: {} ({})", raw_url, e);
            return build(
                LinkResponse::error("Invalid URL").to_bytes(),
                Some(400),
                Some("application/json".to_string()),
            );
        }
    };

    let mut request = ResolveRequest::new(url);
    let value = state.resolver.thumbnail(&mut request).await;

    build(value.payload, value.status_code, value.content_type)
}

fn build(payload: Vec<u8>, status_code: Option<u16>, content_type: Option<String>) -> Response {
    let status = status_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    (status, [(header::CONTENT_TYPE, content_type)], payload).into_response()
}
