// Tooltip 渲染
//
// 把抓取到的页面元信息渲染成 tooltip HTML：
// 标题/描述按字符（而非字节）截断，HTML 转义后套入固定模板。
// 模板产出的是原始 HTML，百分号转义由调用方（加载器）在装入
// JSON 封套前完成。

use crate::services::resolver::meta::PageMetadata;

/// 标题最大长度（字符）
pub const MAX_TITLE_LENGTH: usize = 60;
/// 描述最大长度（字符）
pub const MAX_DESCRIPTION_LENGTH: usize = 200;
/// 用户可见错误消息的最大长度（字符）
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// 按字符数截断，超长时以单个省略号结尾。
/// 恰好等于上限的字符串原样返回；截断永远发生在字符边界上，
/// 不会把多字节字符劈开。
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// 最小 HTML 转义（五个特殊字符）
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 渲染 tooltip HTML。标题缺失时退回显示 URL 本身。
pub fn render(meta: &PageMetadata, url: &str) -> String {
    let title = meta
        .title
        .as_deref()
        .map(|t| truncate_chars(t, MAX_TITLE_LENGTH))
        .unwrap_or_else(|| url.to_string());

    let mut html = format!(
        "<div style=\"text-align: left;\"><b>{}</b>",
        escape_html(&title)
    );

    if let Some(description) = meta.description.as_deref() {
        let description = truncate_chars(description, MAX_DESCRIPTION_LENGTH);
        html.push_str("<br>");
        html.push_str(&escape_html(&description));
    }

    html.push_str("</div>");
    html
}
