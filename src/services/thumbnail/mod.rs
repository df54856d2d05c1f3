// 缩略图服务
//
// 负责把远端图片拉下来并转码成尺寸受限的缩略图：
// - 有界下载（与链接解析共用同一套大小上限）
// - Content-Type 白名单（png / jpeg / gif / webp）
// - 转码在阻塞线程池上执行
// - 失败时产出可缓存的 JSON 错误信封，而不是透传上游错误

pub mod transcode;

pub use transcode::{Thumbnail, TranscodeError};

use crate::services::cache::{LoadError, LoadOutput, Loader};
use crate::services::fetch::{self, FetchOutcome};
use crate::services::resolver::{LinkResponse, ResolveRequest};
use async_trait::async_trait;
use url::Url;

/// 缩略图加载器，喂给缓存层的 [`Loader`] 实现。
///
/// 键是原始图片的 URL。成功时产物是 WebP 字节流，
/// 失败时产物是 JSON 信封（404/500），两者都会被缓存。
pub struct ThumbnailLoader {
    client: reqwest::Client,
    max_content_length: usize,
    max_edge: u32,
}

impl ThumbnailLoader {
    pub fn new(client: reqwest::Client, max_content_length: usize, max_edge: u32) -> Self {
        Self {
            client,
            max_content_length,
            max_edge,
        }
    }

    /// 失败路径统一产出 JSON 信封
    fn envelope_output(response: LinkResponse) -> LoadOutput {
        let status = response.status;
        LoadOutput::new(response.to_bytes())
            .with_status(status)
            .with_content_type("application/json".to_string())
    }
}

#[async_trait]
impl Loader for ThumbnailLoader {
    async fn load(&self, key: &str, _request: &ResolveRequest) -> Result<LoadOutput, LoadError> {
        let url = match Url::parse(key) {
            Ok(url) => url,
            // 无效 URL 是终态，缓存 404 信封
            Err(e) => {
                tracing::debug!("缩略图 URL 无法解析: {} ({})", key, e);
                return Ok(Self::envelope_output(LinkResponse::no_link_info_found()));
            }
        };

        let outcome = fetch::fetch_bounded(&self.client, &url, self.max_content_length).await?;

        let (content_type, body) = match outcome {
            FetchOutcome::Success {
                content_type, body, ..
            } => (content_type, body),
            FetchOutcome::TooLarge => {
                tracing::debug!("缩略图超过大小上限: {}", key);
                return Ok(Self::envelope_output(LinkResponse::response_too_large()));
            }
            FetchOutcome::BadStatus(status) => {
                tracing::debug!("缩略图上游返回 {}: {}", status, key);
                return Ok(Self::envelope_output(LinkResponse::no_link_info_found()));
            }
        };

        let media_type = content_type.as_deref().unwrap_or("");
        if !transcode::is_supported_content_type(media_type) {
            tracing::debug!("不支持的缩略图类型 {}: {}", media_type, key);
            return Ok(Self::envelope_output(LinkResponse::no_link_info_found()));
        }

        let max_edge = self.max_edge;
        let transcoded = tokio::task::spawn_blocking(move || transcode::transcode(&body, max_edge))
            .await
            .map_err(|e| LoadError::Internal(format!("转码任务执行失败: {}", e)))?;

        match transcoded {
            Ok(thumbnail) => Ok(LoadOutput::new(thumbnail.bytes)
                .with_status(200)
                .with_content_type(thumbnail.content_type.to_string())),
            // 解码失败说明上游给的就不是有效图片，缓存 404 信封
            Err(e) => {
                tracing::debug!("缩略图转码失败: {} ({})", key, e);
                Ok(Self::envelope_output(LinkResponse::no_link_info_found()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ThumbnailLoader {
        let client = reqwest::Client::new();
        ThumbnailLoader::new(client, 5 * 1024 * 1024, 300)
    }

    #[tokio::test]
    async fn test_invalid_url_yields_cacheable_404_envelope() {
        let loader = loader();
        let request = ResolveRequest::new(Url::parse("https://example.com/").unwrap());

        let output = loader.load("not a url", &request).await.unwrap();
        assert_eq!(output.status_code, Some(404));
        assert_eq!(output.content_type.as_deref(), Some("application/json"));

        let body = String::from_utf8(output.payload).unwrap();
        assert!(body.contains("No link info found"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        // 连不上的主机是暂时性错误，不该被缓存
        let loader = loader();
        let request = ResolveRequest::new(Url::parse("https://example.com/").unwrap());

        let result = loader
            .load("http://127.0.0.1:1/image.png", &request)
            .await;
        assert!(result.is_err());
    }
}
