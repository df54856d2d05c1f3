// 通用链接加载器
//
// 没有任何站点 resolver 接手（或全部放弃）时的回退路径：
// 受限抓取 -> （重定向落到受支持站点时重放一次 resolver 链）->
// HTML 元信息提取 -> tooltip 渲染 -> JSON 封套。
//
// 预期内的负面结果（非 2xx、响应过大、无可展示信息）编码成
// 封套 payload 作为 Ok 返回，由缓存正常存储；只有传输层故障
// 才以 Err 逃逸（不缓存，下次请求重试）。

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

use crate::services::cache::{LoadError, LoadOutput, Loader};
use crate::services::fetch::{fetch_bounded, FetchOutcome};
use crate::services::resolver::response::LinkResponse;
use crate::services::resolver::{meta, tooltip, ResolveError, ResolveRequest, Resolver};

pub struct LinkLoader {
    client: Client,
    resolvers: Arc<Vec<Arc<dyn Resolver>>>,
    max_content_length: usize,
}

impl LinkLoader {
    pub fn new(
        client: Client,
        resolvers: Arc<Vec<Arc<dyn Resolver>>>,
        max_content_length: usize,
    ) -> Self {
        Self {
            client,
            resolvers,
            max_content_length,
        }
    }

    /// 重定向后的最终 URL 落在受支持的站点上时，对它重放一次
    /// resolver 链（只重放一次，防止循环）。返回首个成功的 payload。
    async fn redispatch(&self, url: &Url) -> Option<Vec<u8>> {
        let mut request = ResolveRequest::new(url.clone());
        for resolver in self.resolvers.iter() {
            if !resolver.check(url, &mut request).await {
                continue;
            }
            match resolver.run(url, &request).await {
                Ok(payload) => {
                    tracing::debug!("重定向目标由 {} 接管: {}", resolver.name(), url);
                    return Some(payload);
                }
                Err(ResolveError::Declined) => continue,
                Err(e) => {
                    tracing::warn!("重定向重放失败 ({}): {}", resolver.name(), e);
                    return None;
                }
            }
        }
        None
    }
}

#[async_trait]
impl Loader for LinkLoader {
    async fn load(&self, key: &str, _request: &ResolveRequest) -> Result<LoadOutput, LoadError> {
        let url = match Url::parse(key) {
            Ok(url) => url,
            // 无效 URL 是稳定的负面结果，照常缓存
            Err(e) => return Ok(json_output(LinkResponse::error(format!("invalid URL: {}", e)))),
        };

        let outcome = fetch_bounded(&self.client, &url, self.max_content_length).await?;

        let (final_url, content_type, body) = match outcome {
            FetchOutcome::BadStatus(_) => {
                return Ok(json_output(LinkResponse::no_link_info_found()))
            }
            FetchOutcome::TooLarge => {
                return Ok(json_output(LinkResponse::response_too_large()))
            }
            FetchOutcome::Success {
                final_url,
                content_type,
                body,
            } => (final_url, content_type, body),
        };

        // 短链/跳转链接落到受支持站点：缓存键仍是原始 URL，
        // payload 用接管方的结果
        if final_url != url {
            if let Some(payload) = self.redispatch(&final_url).await {
                return Ok(LoadOutput::new(payload)
                    .with_status(200)
                    .with_content_type("application/json"));
            }
        }

        // 只对 HTML/文本响应做元信息提取
        if let Some(content_type) = content_type.as_deref() {
            if !is_parsable(content_type) {
                return Ok(json_output(LinkResponse::no_link_info_found()));
            }
        }

        let html = String::from_utf8_lossy(&body);
        let metadata = meta::extract(&html, &final_url);
        if metadata.is_empty() {
            return Ok(json_output(LinkResponse::no_link_info_found()));
        }

        let tooltip_html = tooltip::render(&metadata, final_url.as_str());
        let mut response = LinkResponse::success(
            final_url.to_string(),
            urlencoding::encode(&tooltip_html).into_owned(),
        );
        if let Some(image_url) = metadata.image_url {
            response = response.with_thumbnail(image_url);
        }

        Ok(json_output(response))
    }
}

fn is_parsable(media_type: &str) -> bool {
    matches!(media_type, "text/html" | "application/xhtml+xml") || media_type.starts_with("text/")
}

fn json_output(response: LinkResponse) -> LoadOutput {
    LoadOutput::new(response.to_bytes())
        .with_status(200)
        .with_content_type("application/json")
}
