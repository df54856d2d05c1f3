// 受限内容抓取
//
// 所有对外请求共用一个 reqwest 客户端：固定 User-Agent、显式
// Accept-Language（避免上游按地理位置本地化预览）、整体超时、
// 有限次重定向。
//
// 响应体读取受字节上限约束：Content-Length 声明超限时直接短路，
// 不读响应体；流式读取过程中用累计计数兜底，声明缺失或低报时
// 同样会在越过上限的瞬间中止。

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::services::cache::LoadError;

/// 受限抓取的结果。
/// TooLarge 与 BadStatus 是预期内的、可缓存的负面结果；
/// 传输层故障（DNS、连接拒绝、超时）走 Err(LoadError)，不会被缓存。
#[derive(Debug)]
pub enum FetchOutcome {
    Success {
        /// 跟随重定向后的最终 URL
        final_url: Url,
        /// 去掉参数部分的媒体类型（如 "text/html"）
        content_type: Option<String>,
        body: Vec<u8>,
    },
    /// 声明或实际字节数超过上限
    TooLarge,
    /// 跟随重定向后仍是非 2xx 状态
    BadStatus(StatusCode),
}

/// 构造共享客户端
pub fn build_client(
    user_agent: &str,
    accept_language: &str,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers(headers)
        .build()
}

/// GET 一个 URL，响应体不超过 max_bytes。
pub async fn fetch_bounded(
    client: &Client,
    url: &Url,
    max_bytes: usize,
) -> Result<FetchOutcome, LoadError> {
    let response = client.get(url.clone()).send().await.map_err(LoadError::from)?;

    let status = response.status();
    if !status.is_success() {
        return Ok(FetchOutcome::BadStatus(status));
    }

    // 声明的长度已超限：不读响应体
    if let Some(length) = response.content_length() {
        if length > max_bytes as u64 {
            return Ok(FetchOutcome::TooLarge);
        }
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .map(String::from);

    // 流式读取并累计计数，兜住声明缺失/低报的情况
    let mut body: Vec<u8> = Vec::new();
    let mut response = response;
    while let Some(chunk) = response.chunk().await.map_err(LoadError::from)? {
        if body.len() + chunk.len() > max_bytes {
            return Ok(FetchOutcome::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    Ok(FetchOutcome::Success {
        final_url,
        content_type,
        body,
    })
}

/// 去掉 Content-Type 的参数部分："text/html; charset=utf-8" -> "text/html"
pub fn media_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_strips_parameters() {
        assert_eq!(media_type("text/html; charset=utf-8"), "text/html");
        assert_eq!(media_type("image/png"), "image/png");
        assert_eq!(media_type("  image/gif ; x=y"), "image/gif");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client("test/1.0", "en-US", Duration::from_secs(1)).is_ok());
    }
}
