use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use link_resolver_backend::api;
use link_resolver_backend::config::Settings;
use link_resolver_backend::database::Database;
use link_resolver_backend::services::cache::{
    DurableCache, EvictionTask, KeyProvider, TieredCache,
};
use link_resolver_backend::services::fetch;
use link_resolver_backend::services::resolver::{LinkLoader, LinkResolver, Resolver};
use link_resolver_backend::services::thumbnail::ThumbnailLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let settings = Settings::from_env();

    // Initialize database
    let database = Database::new(&settings.database_url).await?;

    // Shared outbound HTTP client
    let client = fetch::build_client(
        &settings.user_agent,
        &settings.accept_language,
        settings.request_timeout,
    )?;

    // 站点专用 resolver 在这里按优先级注册；留空时所有链接都走通用回退
    let resolvers: Arc<Vec<Arc<dyn Resolver>>> = Arc::new(Vec::new());

    // Link preview cache: memory tier in front of the durable tier
    let link_loader = LinkLoader::new(
        client.clone(),
        Arc::clone(&resolvers),
        settings.max_content_length,
    );
    let durable_links = Arc::new(DurableCache::new(
        database.pool().clone(),
        KeyProvider::new("link"),
        Arc::new(link_loader),
        settings.link_cache_ttl,
    ));
    let link_counters = durable_links.counters();
    let link_cache = Arc::new(TieredCache::new(
        KeyProvider::new("link"),
        durable_links,
        settings.link_cache_ttl,
    ));

    // Thumbnail cache, same shape with its own namespace and TTL
    let thumbnail_loader = ThumbnailLoader::new(
        client.clone(),
        settings.max_content_length,
        settings.max_thumbnail_size,
    );
    let durable_thumbnails = Arc::new(DurableCache::new(
        database.pool().clone(),
        KeyProvider::new("thumbnail"),
        Arc::new(thumbnail_loader),
        settings.thumbnail_cache_ttl,
    ));
    let thumbnail_counters = durable_thumbnails.counters();
    let thumbnail_cache = Arc::new(TieredCache::new(
        KeyProvider::new("thumbnail"),
        durable_thumbnails,
        settings.thumbnail_cache_ttl,
    ));

    let resolver = Arc::new(LinkResolver::new(resolvers, link_cache, thumbnail_cache));

    // Start expired-entry eviction task
    let eviction_task = EvictionTask::new(
        database.pool().clone(),
        settings.eviction_interval,
        Arc::clone(&link_counters),
    );
    tokio::spawn(eviction_task.start());

    // Build our application with routes
    let app = Router::new()
        .route("/", get(|| async { "Link Resolver Backend API v1.0" }))
        .route("/link_resolver/*url", get(api::link_resolver::resolve_link))
        .route("/thumbnail/*url", get(api::thumbnail::serve_thumbnail))
        .route("/health", get(api::health::health_check))
        .route("/stats", get(api::health::get_stats))
        .layer(CorsLayer::permissive())
        .with_state(api::AppState {
            database: database.clone(),
            resolver,
            link_counters,
            thumbnail_counters,
        });

    // Run the server - 从环境变量读取配置
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!(
        "🧹 Cache eviction task started (interval: {:?})",
        settings.eviction_interval
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
