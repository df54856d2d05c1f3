// 链接预览端点
//
// GET /link_resolver/*url
//
// 路径里是百分号转义后的目标 URL。传输层状态码恒为 200，
// 逻辑状态在 JSON 体的 status 字段里，客户端按旧契约只看体。

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use url::Url;

use super::AppState;
use crate::services::resolver::{LinkResponse, ResolveRequest};

pub async fn resolve_link(
    State(state): State<AppState>,
    Path(raw_url): Path<String>,
) -> Response {
    let raw_url = raw_url.trim();

    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("链接无法解析: {} ({})", raw_url, e);
            return json_body(LinkResponse::error("Invalid URL").to_bytes());
        }
    };

    let mut request = ResolveRequest::new(url);
    let value = state.resolver.resolve(&mut request).await;

    json_body(value.payload)
}

fn json_body(payload: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
}
