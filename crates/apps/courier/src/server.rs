//! HTTP API
//!
//! Routes:
//! - `POST /sync` run one sync pass
//! - `GET /messages` synchronized messages, optionally filtered by sender
//! - `GET /inbox` messages not sent by the mailbox itself
//! - `POST /send`, `POST /bulk-send` deliver mail over SMTP
//! - `GET /sent` the sent log
//! - `GET /health`
//!
//! The mail crate is synchronous, so every handler that touches it runs on
//! a blocking thread.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use mail::{
    BulkReport, BulkRequest, MailSender, MailStore, MessageFilter, MessagePage, PageRequest,
    SendError, SendRequest, SentEmail, SentPage, SyncEngine, SyncError, SyncReport,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::settings::CourierConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Absent when no Gmail token is configured
    pub engine: Option<Arc<SyncEngine>>,
    pub store: Arc<dyn MailStore>,
    /// Absent when SMTP is not configured
    pub sender: Option<Arc<dyn MailSender>>,
    pub mailbox_address: String,
}

/// Errors returned to HTTP clients as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    Sync(SyncError),
    Send(SendError),
    Store(anyhow::Error),
    NotConfigured(&'static str),
    Internal(String),
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        ApiError::Sync(e)
    }
}

impl From<SendError> for ApiError {
    fn from(e: SendError) -> Self {
        ApiError::Send(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Store(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Sync(SyncError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::Send(SendError::InvalidRequest(_) | SendError::InvalidBulkRequest(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Sync(e) => e.to_string(),
            ApiError::Send(e) => e.to_string(),
            ApiError::Store(e) => format!("{:#}", e),
            ApiError::NotConfigured(what) => format!("{} is not configured", what),
            ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!("[HTTP] {}", message);
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run `f` on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {}", e)))?
}

/// Query parameters for `GET /messages`
#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub from: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message: &'static str,
    pub sent: SentEmail,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/sync", post(sync_handler))
        .route("/messages", get(messages_handler))
        .route("/inbox", get(inbox_handler))
        .route("/send", post(send_handler))
        .route("/bulk-send", post(bulk_send_handler))
        .route("/sent", get(sent_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(settings: &CourierConfig, state: AppState) -> anyhow::Result<()> {
    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[HTTP] Listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[HTTP] Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("[HTTP] Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn sync_handler(State(state): State<AppState>) -> ApiResult<SyncReport> {
    let engine = state.engine.ok_or(ApiError::NotConfigured("Gmail access"))?;
    let report = blocking(move || Ok(engine.sync()?)).await?;
    Ok(Json(report))
}

async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<MessagePage> {
    let filter = MessageFilter::from_sender(query.from.as_deref());
    let request = PageRequest {
        page: query.page,
        limit: query.limit,
    };
    let store = state.store;
    let page = blocking(move || Ok(mail::list_messages(&*store, &filter, request)?)).await?;
    Ok(Json(page))
}

async fn inbox_handler(
    State(state): State<AppState>,
    Query(request): Query<PageRequest>,
) -> ApiResult<MessagePage> {
    let filter = MessageFilter::inbound(&state.mailbox_address);
    let store = state.store;
    let page = blocking(move || Ok(mail::list_messages(&*store, &filter, request)?)).await?;
    Ok(Json(page))
}

async fn send_handler(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult<SendResponse> {
    let sender = state.sender.ok_or(ApiError::NotConfigured("SMTP"))?;
    let store = state.store;
    let sent = blocking(move || Ok(mail::send_one(&*sender, &*store, request)?)).await?;
    Ok(Json(SendResponse {
        message: "Email sent successfully",
        sent,
    }))
}

async fn bulk_send_handler(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<BulkReport> {
    let sender = state.sender.ok_or(ApiError::NotConfigured("SMTP"))?;
    let store = state.store;
    let report = blocking(move || Ok(mail::send_bulk(&*sender, &*store, request)?)).await?;
    Ok(Json(report))
}

async fn sent_handler(
    State(state): State<AppState>,
    Query(request): Query<PageRequest>,
) -> ApiResult<SentPage> {
    let store = state.store;
    let page = blocking(move || Ok(mail::list_sent(&*store, request)?)).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mail::{
        BulkRecipient, EmailAddress, HistoryCursor, HistoryDelta, InMemoryMailStore, MailProvider,
        MessageId, MessageMetadata, MessageRef, OutgoingEmail, ProviderError, ProviderResult,
        SyncConfig, SyncMode,
    };
    use std::sync::Mutex;

    const MAILBOX: &str = "me@example.com";

    /// One received and one self-sent message; history has expired
    struct TwoMessageProvider;

    impl MailProvider for TwoMessageProvider {
        fn list_recent(&self, _: u32, _: usize) -> ProviderResult<Vec<MessageRef>> {
            Ok(vec![MessageRef::new("in", "t1"), MessageRef::new("out", "t2")])
        }

        fn get_metadata(&self, id: &MessageId) -> ProviderResult<MessageMetadata> {
            let (from, token) = match id.as_str() {
                "in" => ("friend@example.com", 5),
                "out" => (MAILBOX, 6),
                _ => return Err(ProviderError::NotFound(id.clone())),
            };
            Ok(MessageMetadata {
                from: EmailAddress::new(from),
                subject: "Hello".to_string(),
                date: Utc::now(),
                snippet: String::new(),
                history_cursor: Some(HistoryCursor::new(token)),
            })
        }

        fn list_history_since(&self, _: HistoryCursor, _: usize) -> ProviderResult<Vec<HistoryDelta>> {
            Err(ProviderError::HistoryExpired)
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        delivered: Mutex<Vec<OutgoingEmail>>,
    }

    impl MailSender for RecordingSender {
        fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
            self.delivered.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn test_state() -> AppState {
        let store: Arc<dyn MailStore> = Arc::new(InMemoryMailStore::new());
        let engine = SyncEngine::new(
            Arc::new(TwoMessageProvider),
            store.clone(),
            SyncConfig::new(MAILBOX),
        );
        AppState {
            engine: Some(Arc::new(engine)),
            store,
            sender: Some(Arc::new(RecordingSender::default())),
            mailbox_address: MAILBOX.to_string(),
        }
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(SyncError::AlreadyRunning).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SyncError::List {
                what: "history",
                source: ProviderError::Status(503),
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SendError::InvalidBulkRequest("missing subject".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotConfigured("SMTP").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_sync_then_query() {
        let state = test_state();

        let Json(report) = sync_handler(State(state.clone())).await.unwrap();
        assert_eq!(report.mode, SyncMode::Backfill);
        assert_eq!(report.seeded, Some(2));

        let Json(all) = messages_handler(State(state.clone()), Query(MessagesQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.total, 2);

        let Json(inbox) = inbox_handler(State(state.clone()), Query(PageRequest::default()))
            .await
            .unwrap();
        assert_eq!(inbox.total, 1);
        assert_eq!(inbox.items[0].id.as_str(), "in");

        let query = MessagesQuery {
            from: Some("FRIEND".to_string()),
            ..Default::default()
        };
        let Json(filtered) = messages_handler(State(state), Query(query)).await.unwrap();
        assert_eq!(filtered.total, 1);
    }

    #[tokio::test]
    async fn test_expired_history_is_server_error() {
        let state = test_state();
        sync_handler(State(state.clone())).await.unwrap();

        let err = sync_handler(State(state)).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("history"));
    }

    #[tokio::test]
    async fn test_sync_without_gmail() {
        let mut state = test_state();
        state.engine = None;

        let err = sync_handler(State(state)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_send_records_sent_log() {
        let state = test_state();
        let request = SendRequest {
            name: None,
            email: "jane@example.com".to_string(),
            subject: "Hi".to_string(),
            message: "Hello".to_string(),
        };

        let Json(response) = send_handler(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(response.sent.email, "jane@example.com");

        let Json(sent) = sent_handler(State(state), Query(PageRequest::default()))
            .await
            .unwrap();
        assert_eq!(sent.total, 1);
    }

    #[tokio::test]
    async fn test_bulk_send_validation() {
        let state = test_state();
        let request = BulkRequest {
            subject: String::new(),
            message: "Body".to_string(),
            batch: None,
            recipients: vec![BulkRecipient {
                email: "a@example.com".to_string(),
                ..Default::default()
            }],
        };

        let err = bulk_send_handler(State(state), Json(request)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(health) = health_handler().await;
        assert_eq!(health.status, "ok");
    }
}
