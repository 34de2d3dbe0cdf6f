use crate::cli::Args;
use crate::content::sitemap::render_sitemap;
use crate::content::{ BlogStore, ContentError };
use crate::models::chat::ErrorBody;
use crate::relay::Relay;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::{ Path, State },
    response::{ IntoResponse, Response },
    http::{ header, StatusCode },
    Json,
};
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub blogs: Arc<BlogStore>,
    pub site_url: String,
}

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        match self {
            ContentError::NotFound(slug) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::new(format!("Blog '{}' not found", slug)))).into_response()
            }
            other => {
                error!("Content error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Failed to load blog content")),
                ).into_response()
            }
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/blogs", get(list_blogs_handler))
        .route("/api/blogs/{slug}", get(get_blog_handler))
        .route("/sitemap.xml", get(sitemap_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: SocketAddr,
    state: AppState,
    args: &Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = build_router(state);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                error!("--enable-tls was set but --tls-cert-path and --tls-key-path were not both provided.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);

        let _ = rustls::crypto::ring::default_provider().install_default();
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("HTTPS server listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("HTTP server listening on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    state.relay.respond(body).await
}

async fn list_blogs_handler(State(state): State<AppState>) -> Response {
    match state.blogs.list().await {
        Ok(blogs) => Json(blogs).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_blog_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    match state.blogs.get(&slug).await {
        Ok(blog) => Json(blog).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn sitemap_handler(State(state): State<AppState>) -> Response {
    let blogs = state.blogs.list().await.unwrap_or_else(|e| {
        warn!("Sitemap built without blog entries: {}", e);
        Vec::new()
    });
    let xml = render_sitemap(&state.site_url, &blogs, chrono::Utc::now());
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if !state.relay.is_configured() {
        warn!("Health check: chat relay has no upstream credential");
    }
    "ok"
}
