//! HTTP upload surface.
//!
//! `POST /upload` takes a multipart form with an `image` field, runs it
//! through a [`FloorPlanAnalyzer`] and relays the answer text unchanged.

use crate::client::FloorPlanAnalyzer;
use crate::error::ConfigError;
use crate::image;
use crate::types::ServerConfig;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
struct AppState {
    analyzer: Arc<FloorPlanAnalyzer>,
}

type JsonReply = (StatusCode, Json<Value>);

/// Build the router with CORS and the upload size limit applied.
pub fn build_router(
    analyzer: Arc<FloorPlanAnalyzer>,
    config: &ServerConfig,
) -> Result<Router, ConfigError> {
    let origin: HeaderValue =
        config
            .allowed_origin
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: "TABLEMAP_ALLOWED_ORIGIN",
                value: config.allowed_origin.clone(),
            })?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60));

    Ok(Router::new()
        .route("/", get(home))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(AppState { analyzer }))
}

/// Bind `config.addr()` and serve until ctrl-c.
pub async fn serve(analyzer: FloorPlanAnalyzer, config: ServerConfig) -> anyhow::Result<()> {
    let app = build_router(Arc::new(analyzer), &config)?;
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, origin = %config.allowed_origin, "Upload server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutting down upload server");
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Hello, World!" }))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> JsonReply {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Upload is not a multipart form");
            return reply(StatusCode::BAD_REQUEST, json!({ "error": "No file uploaded" }));
        }
    };

    let (declared_mime, bytes) = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => {
                let declared = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => break (declared, bytes),
                    Err(e) => {
                        warn!(error = %e, "Failed to read uploaded image");
                        return reply(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            json!({ "error": "Failed to read file" }),
                        );
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => {
                return reply(StatusCode::BAD_REQUEST, json!({ "error": "No file uploaded" }));
            }
            Err(e) => {
                warn!(error = %e, "Malformed multipart body");
                return reply(StatusCode::BAD_REQUEST, json!({ "error": "No file uploaded" }));
            }
        }
    };

    let mime_type = image::resolve_mime_type(declared_mime.as_deref(), &bytes);

    match state.analyzer.analyze_image(&bytes, &mime_type).await {
        Ok(response) => reply(
            StatusCode::OK,
            json!({
                "message": "Image processed successfully",
                "response": response,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Image analysis failed");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Failed to process image",
                    "details": e.to_string(),
                }),
            )
        }
    }
}

fn reply(status: StatusCode, body: Value) -> JsonReply {
    (status, Json(body))
}
