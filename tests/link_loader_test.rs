// 通用链接加载器集成测试
//
// 起一个本地 axum 服务器，验证回退路径的端到端行为：
// 抓取 -> 元信息提取 -> tooltip 渲染 -> JSON 封套，
// 以及重定向落到受支持站点时对 resolver 链的一次性重放。

use async_trait::async_trait;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use link_resolver_backend::services::fetch;
use link_resolver_backend::services::resolver::{
    LinkLoader, LinkResponse, ResolveError, ResolveRequest, Resolver,
};
use link_resolver_backend::services::cache::Loader;

const PAGE_HTML: &str = r#"<html><head>
    <title>Fallback Title</title>
    <meta property="og:title" content="OG Title">
    <meta property="og:description" content="OG Description">
    <meta property="og:image" content="/static/cover.png">
</head><body></body></html>"#;

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/page", get(page))
        .route("/jump", get(|| async { Redirect::temporary("/target") }))
        .route("/target", get(page))
        .route(
            "/empty",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html")],
                    "<html><body><p>nothing here</p></body></html>",
                )
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn page() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], PAGE_HTML)
}

/// 只接手路径为 /target 的 URL 的桩 resolver，记录看到的 URL
struct TargetResolver {
    runs: AtomicUsize,
    seen: Mutex<Option<Url>>,
}

impl TargetResolver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicUsize::new(0),
            seen: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Resolver for TargetResolver {
    fn name(&self) -> &'static str {
        "target"
    }

    async fn check(&self, url: &Url, _request: &mut ResolveRequest) -> bool {
        url.path() == "/target"
    }

    async fn run(&self, url: &Url, _request: &ResolveRequest) -> Result<Vec<u8>, ResolveError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(url.clone());
        Ok(b"{\"status\":200,\"link\":\"handled\"}".to_vec())
    }
}

fn loader(resolvers: Vec<Arc<dyn Resolver>>) -> LinkLoader {
    let client = fetch::build_client("test-agent/0.1", "en-US", Duration::from_secs(5)).unwrap();
    LinkLoader::new(client, Arc::new(resolvers), 5 * 1024 * 1024)
}

fn request() -> ResolveRequest {
    ResolveRequest::new(Url::parse("https://example.com/").unwrap())
}

#[tokio::test]
async fn test_fetch_extract_render_envelope_end_to_end() {
    let addr = spawn_server().await;
    let page_url = format!("http://{}/page", addr);

    let output = loader(Vec::new()).load(&page_url, &request()).await.unwrap();
    assert_eq!(output.status_code, Some(200));
    assert_eq!(output.content_type.as_deref(), Some("application/json"));

    let envelope: LinkResponse = serde_json::from_slice(&output.payload).unwrap();
    assert_eq!(envelope.status, 200);
    assert_eq!(envelope.link.as_deref(), Some(page_url.as_str()));

    // tooltip 是百分号转义后的 HTML
    let tooltip = urlencoding::decode(envelope.tooltip.as_deref().unwrap())
        .unwrap()
        .into_owned();
    assert!(tooltip.contains("<b>OG Title</b>"));
    assert!(tooltip.contains("OG Description"));

    // 相对图片地址已基于页面 URL 变成绝对地址
    assert_eq!(
        envelope.thumbnail.as_deref(),
        Some(format!("http://{}/static/cover.png", addr).as_str())
    );
}

#[tokio::test]
async fn test_redirect_target_replayed_through_resolver_chain() {
    let addr = spawn_server().await;
    let resolver = TargetResolver::new();
    let loader = loader(vec![resolver.clone() as Arc<dyn Resolver>]);

    let jump_url = format!("http://{}/jump", addr);
    let output = loader.load(&jump_url, &request()).await.unwrap();

    // 重定向目标被 resolver 接管，其产出成为原始键的 payload
    assert_eq!(resolver.runs.load(Ordering::SeqCst), 1);
    assert_eq!(output.payload, b"{\"status\":200,\"link\":\"handled\"}");
    assert_eq!(output.content_type.as_deref(), Some("application/json"));

    let seen = resolver.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.path(), "/target");
}

#[tokio::test]
async fn test_redirect_without_matching_resolver_extracts_final_page() {
    let addr = spawn_server().await;
    let jump_url = format!("http://{}/jump", addr);

    let output = loader(Vec::new()).load(&jump_url, &request()).await.unwrap();
    let envelope: LinkResponse = serde_json::from_slice(&output.payload).unwrap();

    // 没有 resolver 接手时，元信息提取针对重定向后的最终页面
    assert_eq!(envelope.status, 200);
    assert_eq!(
        envelope.link.as_deref(),
        Some(format!("http://{}/target", addr).as_str())
    );
}

#[tokio::test]
async fn test_page_without_metadata_yields_404_envelope() {
    let addr = spawn_server().await;
    let empty_url = format!("http://{}/empty", addr);

    let output = loader(Vec::new()).load(&empty_url, &request()).await.unwrap();
    let envelope: LinkResponse = serde_json::from_slice(&output.payload).unwrap();
    assert_eq!(envelope.status, 404);
    assert_eq!(
        envelope.message.as_deref(),
        Some("Could not fetch link info: No link info found")
    );
}
