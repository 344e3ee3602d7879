use crate::config::AppConfig;
use crate::errors::SessionError;
use crate::session::{
    attach_registry, registry_from_extensions, RegistryRef, RequestInfo, SessionRef,
    SessionStoreRef,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    store: SessionStoreRef,
}

impl AppState {
    pub fn new(config: AppConfig, store: SessionStoreRef) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

/// Extractor for the session registry attached by [`session_middleware`]
pub struct Sessions(pub RegistryRef);

#[async_trait]
impl<S> FromRequestParts<S> for Sessions
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        registry_from_extensions(&parts.extensions)
            .map(Sessions)
            .ok_or(ApiError::Session(SessionError::NoRegistry))
    }
}

/// Request model for queued flash messages
#[derive(Deserialize)]
pub struct FlashRequest {
    message: String,
}

#[derive(Serialize, Deserialize)]
pub struct VisitsResponse {
    pub visits: u64,
    pub is_new: bool,
}

#[derive(Serialize, Deserialize)]
pub struct FlashesResponse {
    pub flashes: Vec<Value>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    Session(SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Session(e) => {
                error!(error = %e, "Session error");
                let body = Json(ErrorResponse {
                    error: format!("Session error: {}", e),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

/// Attach a session registry to the request and save every session the
/// handlers touched once the response is ready.
pub async fn session_middleware<B>(mut request: Request<B>, next: Next<B>) -> Response {
    let info = RequestInfo::from_request(&request);
    let registry = attach_registry(request.extensions_mut(), info);

    let mut response = next.run(request).await;

    if let Err(e) = registry.save(response.headers_mut()).await {
        error!(error = %e, "Failed to save sessions");
    }
    response
}

/// Build the router with CORS and session handling
pub fn router(state: AppState) -> Router {
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/visits", get(count_visit))
        .route("/flash", get(read_flashes).post(add_flash))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(middleware::from_fn(session_middleware)),
        )
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(
    config: AppConfig,
    store: SessionStoreRef,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    let app = router(AppState::new(config, store));

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Fetch the configured session. A session whose stored state could not be
/// loaded is replaced by the store's fresh fallback.
async fn load_session(sessions: &Sessions, state: &AppState) -> Result<SessionRef, ApiError> {
    match sessions
        .0
        .get(state.store.clone(), &state.config.session_name)
        .await
    {
        Ok(session) => Ok(session),
        Err(SessionError::Creation {
            name,
            session,
            source,
        }) => {
            warn!(session = %name, error = %source, "Starting a fresh session");
            Ok(session)
        }
        Err(e) => Err(ApiError::Session(e)),
    }
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "Session daemon is running"
}

async fn count_visit(
    State(state): State<AppState>,
    sessions: Sessions,
) -> Result<Json<VisitsResponse>, ApiError> {
    let session = load_session(&sessions, &state).await?;
    let mut session = session.lock().await;

    let visits = session.get("visits").and_then(Value::as_u64).unwrap_or(0) + 1;
    session.set("visits", visits);

    Ok(Json(VisitsResponse {
        visits,
        is_new: session.is_new,
    }))
}

async fn add_flash(
    State(state): State<AppState>,
    sessions: Sessions,
    Json(payload): Json<FlashRequest>,
) -> Result<StatusCode, ApiError> {
    let session = load_session(&sessions, &state).await?;
    session.lock().await.add_flash(payload.message);
    Ok(StatusCode::ACCEPTED)
}

async fn read_flashes(
    State(state): State<AppState>,
    sessions: Sessions,
) -> Result<Json<FlashesResponse>, ApiError> {
    let session = load_session(&sessions, &state).await?;
    let flashes = session.lock().await.flashes();
    Ok(Json(FlashesResponse { flashes }))
}
