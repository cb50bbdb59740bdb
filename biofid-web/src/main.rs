//! Servidor web Axum para conversão de documentos UIMA em texto anotado

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use biofid_core::{
    convert_directory, convert_file, ConversionConfig, ConversionError, NamedEntity, NlpReader,
    UimaReader,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Estado compartilhado da aplicação
struct AppState {
    config: ConversionConfig,
}

#[derive(Deserialize)]
struct DocumentRequest {
    path: PathBuf,
}

#[derive(Deserialize)]
struct BatchRequest {
    folder: PathBuf,
    sink_dir: PathBuf,
}

#[derive(Serialize)]
struct ConvertResponse {
    annotated_text: Option<String>,
}

#[derive(Serialize)]
struct ReaderResponse {
    text: String,
    taxa: Vec<NamedEntity>,
    locations: Vec<NamedEntity>,
    annotated_text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("BIOFID_CONFIG") {
        Ok(path) => {
            info!("Carregando configuração de {}", path);
            ConversionConfig::from_json_file(Path::new(&path))?
        }
        Err(_) => ConversionConfig::default(),
    };
    // Falha cedo se o typesystem configurado for inválido
    config.load_typesystem()?;

    let state = Arc::new(AppState { config });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/convert", post(convert_handler))
        .route("/reader", post(reader_handler))
        .route("/batch", post(batch_handler))
        .layer(cors)
        .with_state(state);

    let addr = std::env::var("BIOFID_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor BIOfid iniciado em http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Retorna a página principal HTML
async fn index_handler() -> impl IntoResponse {
    Html(include_str!("templates/index.html"))
}

/// Converte um documento em texto anotado (`null` se não houver conteúdo)
async fn convert_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DocumentRequest>,
) -> Response {
    info!("Convertendo {}", req.path.display());
    let result = tokio::task::spawn_blocking(move || convert_file(&req.path, &state.config)).await;

    match result {
        Ok(Ok(annotated_text)) => Json(ConvertResponse { annotated_text }).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(err) => join_error(err),
    }
}

/// Taxa, locais e texto de um documento
async fn reader_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DocumentRequest>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        UimaReader::open(&req.path, &state.config).map(|reader| ReaderResponse {
            text: reader.text().to_string(),
            taxa: reader.taxa(),
            locations: reader.locations(),
            annotated_text: reader.annotated_text().map(str::to_string),
        })
    })
    .await;

    match result {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(err) => join_error(err),
    }
}

/// Converte um diretório inteiro em paralelo
async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Response {
    info!("Lote: {} → {}", req.folder.display(), req.sink_dir.display());
    let result =
        tokio::task::spawn_blocking(move || convert_directory(&req.folder, &req.sink_dir, &state.config)).await;

    match result {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(err) => join_error(err),
    }
}

fn status_for(err: &ConversionError) -> StatusCode {
    match err {
        ConversionError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ConversionError::NotFound { .. } => StatusCode::NOT_FOUND,
        ConversionError::Parse { .. } | ConversionError::EmptyDirectory { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ConversionError::Config(_) => StatusCode::BAD_REQUEST,
        ConversionError::Io(_) | ConversionError::TypeSystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &ConversionError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Falha na conversão: {}", err);
    }
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

fn join_error(err: tokio::task::JoinError) -> Response {
    error!("Tarefa de conversão abortada: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "conversão abortada"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ConversionError::UnsupportedFormat { path: "a.pdf".into() };
        assert_eq!(status_for(&err), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let err = ConversionError::NotFound { path: "a.xmi".into() };
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
        let err = ConversionError::Parse { message: "x".into(), position: 3 };
        assert_eq!(status_for(&err), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
