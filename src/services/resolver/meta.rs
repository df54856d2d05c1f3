// 页面元信息提取
//
// 从 HTML 中提取 <title> 与 Open Graph / Twitter 卡片元标签。
// 每个字段在两个等价属性名（og:* 与 twitter:*）中取文档顺序里
// 最先出现的那个，后续重复的忽略。相对图片地址解析为绝对 URL。

use scraper::{Html, Selector};
use url::Url;

/// 提取出的页面元信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl PageMetadata {
    /// 既无标题也无描述时视为没有可展示的信息
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// 从 HTML 文档提取元信息。base 用于解析相对图片地址。
pub fn extract(html: &str, base: &Url) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = first_meta_content(
        &document,
        "meta[property='og:title'], meta[name='twitter:title']",
    )
    .or_else(|| document_title(&document));

    let description = first_meta_content(
        &document,
        "meta[property='og:description'], meta[name='twitter:description']",
    )
    .or_else(|| first_meta_content(&document, "meta[name='description']"));

    let image_url = first_meta_content(
        &document,
        "meta[property='og:image'], meta[name='twitter:image']",
    )
    .and_then(|raw| absolutize(base, &raw));

    PageMetadata {
        title,
        description,
        image_url,
    }
}

/// 组合选择器按文档顺序遍历，第一个带非空 content 的标签生效
fn first_meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(String::from)
}

fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// 相对地址基于页面 URL 解析为绝对地址；解析失败则丢弃
fn absolutize(base: &Url, raw: &str) -> Option<String> {
    base.join(raw).ok().map(|u| u.to_string())
}
