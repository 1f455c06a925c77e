use axum::{
    Router,
    http::{Method, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use rust_embed::RustEmbed;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::model::ModelHandle;
use crate::server::config::ServerConfig;
use crate::web::{error::AppError, routes::*};

pub mod error;
pub mod models;
pub mod routes;

#[derive(RustEmbed, Clone)]
#[folder = "static"]
pub struct Assets;

#[derive(Clone)]
pub struct AppState {
    pub model: ModelHandle,
    pub config: Arc<ServerConfig>,
}

fn serve_asset(path: &str) -> Result<Response, AppError> {
    let asset = Assets::get(path).ok_or_else(|| AppError::NotFound(format!("/{path}")))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], asset.data).into_response())
}

async fn landing_page_handler() -> Result<Response, AppError> {
    serve_asset("index.html")
}

async fn static_asset_handler(uri: Uri) -> Result<Response, AppError> {
    serve_asset(uri.path().trim_start_matches('/'))
}

pub fn create_axum_router(model: ModelHandle, config: Arc<ServerConfig>) -> Router {
    let cors_allow_any_origin = config.cors_allow_any_origin;
    let app_state = Arc::new(AppState { model, config });

    let router = Router::new()
        .route("/", get(landing_page_handler))
        .merge(predict_routes::predict_router())
        .merge(health_routes::health_router())
        .fallback(static_asset_handler)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    if cors_allow_any_origin {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}
