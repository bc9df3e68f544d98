use serde_json::json;
use std::convert::Infallible;
use warp::{Filter, Reply};

use crate::layout::templates;

/// Liveness check; also reports what the renderer offers.
pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "templates": templates().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub fn build_health_routes(
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check)
}
