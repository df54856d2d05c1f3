// 响应封套
//
// 加载器产出的 payload 的序列化契约：JSON 对象，传输层状态码恒为 200，
// 逻辑状态放在自身的 status 字段里。通用链接加载器和缩略图加载器的
// 失败结果都用这个形状编码（成功的缩略图直接返回图片字节，不经过这里）。

use serde::{Deserialize, Serialize};

use crate::services::resolver::tooltip;

/// 返回给聊天客户端的逻辑响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// URL 转义后的 tooltip HTML
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// 缩略图 URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// 解析后的最终链接
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl LinkResponse {
    pub fn success(link: impl Into<String>, tooltip: impl Into<String>) -> Self {
        Self {
            status: 200,
            message: None,
            tooltip: Some(tooltip.into()),
            thumbnail: None,
            link: Some(link.into()),
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// 预期内的负面结果（上游 404、格式不支持等），可缓存
    pub fn no_link_info_found() -> Self {
        Self {
            status: 404,
            message: Some("Could not fetch link info: No link info found".to_string()),
            tooltip: None,
            thumbnail: None,
            link: None,
        }
    }

    /// 响应体超出字节上限，可缓存
    pub fn response_too_large() -> Self {
        Self {
            status: 500,
            message: Some("Could not fetch link info: Response too large".to_string()),
            tooltip: None,
            thumbnail: None,
            link: None,
        }
    }

    /// 错误响应。原始错误文本先截断（≤500 字符）再做 HTML 转义，
    /// 防止注入和日志/响应膨胀。
    pub fn error(message: impl AsRef<str>) -> Self {
        let message = tooltip::truncate_chars(message.as_ref(), tooltip::MAX_ERROR_MESSAGE_LENGTH);
        Self {
            status: 500,
            message: Some(tooltip::escape_html(&message)),
            tooltip: None,
            thumbnail: None,
            link: None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self)
            .unwrap_or_else(|_| br#"{"status":500,"message":"Internal error"}"#.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_skipped() {
        let json = String::from_utf8(LinkResponse::no_link_info_found().to_bytes()).unwrap();
        assert!(json.contains("\"status\":404"));
        assert!(!json.contains("tooltip"));
        assert!(!json.contains("thumbnail"));
        assert!(!json.contains("link"));
    }

    #[test]
    fn test_error_message_is_escaped() {
        let response = LinkResponse::error("boom <script>alert(1)</script>");
        let message = response.message.unwrap();
        assert!(!message.contains('<'));
        assert!(message.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_error_message_is_truncated() {
        let long = "x".repeat(2000);
        let response = LinkResponse::error(&long);
        assert!(response.message.unwrap().chars().count() <= 500);
    }

    #[test]
    fn test_success_roundtrip() {
        let response = LinkResponse::success("https://example.com/", "tooltip")
            .with_thumbnail("https://example.com/img.png");
        let parsed: LinkResponse = serde_json::from_slice(&response.to_bytes()).unwrap();
        assert_eq!(parsed, response);
    }
}
