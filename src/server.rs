use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::llm::{ChatCompletionsResponder, EchoResponder, ModelChoice, Responder};
use crate::message::Message;

/// Request body limit for uploads (10MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Prefix stored uploads are named with.
const UPLOAD_NAME_PREFIX: &str = "web_";

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let uploads_dir = config.server.uploads_dir.clone();
    tokio::fs::create_dir_all(&uploads_dir).await?;

    let responder: Arc<dyn Responder> = match config.llm.settings() {
        Some(settings) => {
            info!(
                name: "llm.config.loaded",
                base_url = %settings.base_url,
                text_model = %settings.text_model,
                vision_model = %settings.vision_model,
                "LLM configuration loaded"
            );
            Arc::new(ChatCompletionsResponder::new(settings, uploads_dir.clone()))
        }
        None => {
            info!(name: "llm.config.missing", "No LLM base URL configured; using echo replies");
            Arc::new(EchoResponder)
        }
    };

    let state = AppState {
        renderer: config.widget.settings().renderer,
        title: Arc::from(config.server.title.as_str()),
        ..AppState::new(responder, uploads_dir)
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the router: the page, the message API, uploads.
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.uploads_dir.as_path());

    Router::new()
        .route("/", get(index_handler))
        .route(
            "/api/messages",
            get(list_messages_handler).post(create_message_handler),
        )
        .route("/api/upload", post(upload_handler))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Error body returned with 4xx/5xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Success body of the write endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Request body for `POST /api/messages`.
#[derive(Debug, Deserialize)]
struct CreateMessageRequest {
    #[serde(default)]
    content: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
}

/// GET / - The page, pre-rendered with the current conversation.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.renderer.page(&state.title, &state.log.snapshot()))
}

/// GET /api/messages - The whole conversation, oldest first.
async fn list_messages_handler(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(state.log.snapshot())
}

/// POST /api/messages - Record a user message and the bot's reply.
async fn create_message_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<StatusBody>, ApiError> {
    let Some(content) = req.content.filter(|c| !c.is_empty()) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Message content is required",
        ));
    };

    info!(chars = content.chars().count(), "Received chat message");
    state.log.push(Message::user_text(content));
    reply(&state, ModelChoice::Text).await?;

    Ok(Json(StatusBody {
        status: "success".to_string(),
        filename: None,
    }))
}

/// POST /api/upload - Store an image, record it and the bot's reply.
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StatusBody>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart field: {e}"),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Failed to read file '{original}': {e}"),
            )
        })?;
        upload = Some((original, data));
        break;
    }

    let Some((original, data)) = upload else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "No file part in the request",
        ));
    };
    if original.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No selected file"));
    }

    let filename = stored_name(&original);
    let path = state.uploads_dir.join(&filename);
    save_upload(&path, &data).await.map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "Failed to store upload");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store file")
    })?;

    info!(file = %filename, size = data.len(), "Stored uploaded image");
    state
        .log
        .push(Message::user_image(format!("/uploads/{filename}")));
    reply(&state, ModelChoice::Vision).await?;

    Ok(Json(StatusBody {
        status: "success".to_string(),
        filename: Some(filename),
    }))
}

/// Ask the responder about the conversation and record its answer.
async fn reply(state: &AppState, model: ModelChoice) -> Result<(), ApiError> {
    let history = state.log.snapshot();
    match state.responder.reply(&history, model).await {
        Ok(text) => {
            state.log.push(Message::bot_text(text));
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, ?model, "Responder failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// `web_<uuid>` plus the original extension.
fn stored_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{UPLOAD_NAME_PREFIX}{}{ext}", uuid::Uuid::new_v4())
}

async fn save_upload(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, data).await
}
