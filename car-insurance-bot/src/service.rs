use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use intake_flow::{
    Adapters, ChatId, InMemorySessionStore, IntakeError, IntakeMachine, IntakePhase,
    IntakeRunner, WaitingFor,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

use crate::{
    adapters::{LlmGenerator, OpenRouterClient, PdfRenderer, VisionOcrExtractor},
    config::{BotConfig, TelegramMode},
    dispatcher::Dispatcher,
    telegram::{TelegramClient, TelegramUpdate, inbound_event},
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn unauthorized_error(message: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, chat_id: ChatId) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "chat_id": chat_id
        })),
    )
}

fn unavailable_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub runner: IntakeRunner,
    /// Set only in webhook mode; the webhook route is not mounted otherwise
    pub webhook_secret: Option<String>,
}

/// Session progress without the stored file ids
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub chat_id: ChatId,
    pub phase: IntakePhase,
    pub waiting_for: WaitingFor,
    pub passport_received: bool,
    pub vehicle_document_received: bool,
}

/// Wire the production adapters, runner and dispatcher together
pub fn create_app_state(config: &BotConfig, telegram: TelegramClient) -> AppState {
    let openrouter = OpenRouterClient::new(&config.openrouter_api_key);
    let adapters = Adapters::new(
        Arc::new(VisionOcrExtractor::new(
            telegram.clone(),
            openrouter,
            config.ocr_model.clone(),
        )),
        Arc::new(LlmGenerator::new(
            &config.openrouter_api_key,
            &config.llm_model,
        )),
        Arc::new(PdfRenderer::new()),
    );

    let machine = Arc::new(IntakeMachine::new(adapters, config.intake.clone()));
    let runner = IntakeRunner::new(machine, Arc::new(InMemorySessionStore::new()));
    let dispatcher = Dispatcher::new(runner.clone(), Arc::new(telegram));

    AppState {
        dispatcher,
        runner,
        webhook_secret: match config.mode {
            TelegramMode::Webhook => config.webhook_secret.clone(),
            TelegramMode::Polling => None,
        },
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/sessions/{chat_id}", get(get_session));
    if app_state.webhook_secret.is_some() {
        router = router.route("/telegram/webhook", post(telegram_webhook));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "sessions": state.runner.session_count(),
        "active_chats": state.dispatcher.active_chats()
    }))
}

/// Telegram only needs a 2xx; the event is handled on the chat's worker
async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> ApiResult<Value> {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented.is_none() || presented != state.webhook_secret.as_deref() {
        warn!(update_id = update.update_id, "rejecting webhook call with bad secret token");
        return Err(unauthorized_error("Invalid secret token"));
    }

    match inbound_event(&update) {
        Some(event) => state.dispatcher.submit(event),
        None => debug!(update_id = update.update_id, "ignoring unsupported update"),
    }
    Ok(Json(json!({ "ok": true })))
}

async fn get_session(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> ApiResult<SessionResponse> {
    let chat_id = ChatId(chat_id);
    let session = state.runner.session(chat_id).await.map_err(|e| match e {
        IntakeError::SessionUnavailable(_) => {
            error!("Session {} stayed locked: {}", chat_id, e);
            unavailable_error("Session is busy", &e.to_string())
        }
    })?;

    let session = session.ok_or_else(|| not_found_error("Session not found", chat_id))?;
    Ok(Json(SessionResponse {
        chat_id,
        phase: session.phase(),
        waiting_for: session.waiting_for(),
        passport_received: session.passport_received(),
        vehicle_document_received: session.vehicle_document_received(),
    }))
}
