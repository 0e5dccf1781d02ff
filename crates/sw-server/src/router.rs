//! Axum router construction.
//!
//! Builds the full application router with the control API, middleware
//! layers, the OpenAPI document and optional static file serving.

use std::path::PathBuf;

use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::streams::list_streams,
        routes::streams::get_stream,
        routes::streams::start_stream,
        routes::streams::stop_stream,
        routes::probe::probe_stream,
        routes::history::list_history,
        routes::history::clear_history,
        routes::tools::tools,
    ),
    components(schemas(
        routes::ActionResponse,
        routes::health::HealthResponse,
        routes::streams::StartRequest,
        routes::probe::ProbeRequest,
        sw_core::ChannelStatus,
        sw_core::HistoryRecord,
        sw_core::HistoryEvent,
        sw_core::ProbeResult,
        sw_core::StreamInfo,
        sw_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(routes::health::health_check))
        // Streams
        .route("/streams", get(routes::streams::list_streams))
        .route("/streams/{channel}", get(routes::streams::get_stream))
        .route(
            "/streams/{channel}/start",
            post(routes::streams::start_stream),
        )
        .route("/streams/{channel}/stop", post(routes::streams::stop_stream))
        // Probe
        .route("/probe", post(routes::probe::probe_stream))
        // History
        .route("/history", get(routes::history::list_history))
        .route("/history/clear", post(routes::history::clear_history))
        // Tools
        .route("/tools", get(routes::tools::tools));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for a control panel build.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        }
    }

    app
}
