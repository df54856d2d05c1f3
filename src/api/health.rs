use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::AppState;

/// 健康检查端点
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    // 检查数据库连接
    state.database.get_stats().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::Internal("Database connection failed".to_string())
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "database": "connected"
    })))
}

/// 获取系统统计信息
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let db_stats = state
        .database
        .get_stats()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to get database stats: {}", e)))?;

    Ok(Json(json!({
        "cache_entries": db_stats.cache_count,
        "database_size_mb": db_stats.database_size_mb(),
        "link_cache": state.link_counters.snapshot(),
        "thumbnail_cache": state.thumbnail_counters.snapshot(),
        "resolver_hits": state.resolver.resolver_hit_counts(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
