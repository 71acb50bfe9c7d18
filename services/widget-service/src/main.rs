//! HTTP facade for the wallet session.
//!
//! The page-interaction layer owns the DOM; this service owns the session.
//! It receives raw field values, runs the session operations, and returns
//! renderable state and classified errors.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use vw_api_types::{
    BalanceResponse, ConnectResponse, SessionViewResponse, TransferRequest, TransferResponse,
};
use vw_ledger::Erc20Ledger;
use vw_provider::{Provider, RpcProvider};
use vw_session::{SessionError, WalletSession};

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
struct AppState {
    session: Arc<WalletSession>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let provider = RpcProvider::detect().map(|p| Arc::new(p) as Arc<dyn Provider>);
    if provider.is_none() {
        warn!("VERTAWALLET_PROVIDER_URL not set; connect will report provider_unavailable");
    }

    let ledger = Arc::new(Erc20Ledger::new(provider.clone(), None));
    let state = AppState {
        session: Arc::new(WalletSession::new(provider, ledger)),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/session", get(session_view))
        .route("/session/connect", post(session_connect))
        .route("/session/balance", post(session_balance))
        .route("/session/transfer", post(session_transfer))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = std::env::var("WIDGET_SERVICE_ADDR")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
    info!("widget-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "widget-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "widget-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn session_view(State(state): State<AppState>) -> Json<SessionViewResponse> {
    let snapshot = state.session.snapshot();
    Json(SessionViewResponse {
        status: snapshot.status.to_string(),
        account_address: snapshot.account.map(|a| a.0),
        token_balance: snapshot.balance.map(|b| b.to_string()),
        last_error: snapshot.last_error.map(|e| e.to_string()),
    })
}

async fn session_connect(State(state): State<AppState>) -> ApiResult<ConnectResponse> {
    let account = state.session.connect().await.map_err(session_error)?;
    let snapshot = state.session.snapshot();
    Ok(Json(ConnectResponse {
        account_address: account.0,
        token_balance: snapshot.balance.map(|b| b.to_string()),
    }))
}

async fn session_balance(State(state): State<AppState>) -> ApiResult<BalanceResponse> {
    let balance = state.session.refresh_balance().await.map_err(session_error)?;
    let snapshot = state.session.snapshot();
    let account_address = snapshot.account.map(|a| a.0).unwrap_or_default();
    Ok(Json(BalanceResponse {
        account_address,
        token_balance: balance.to_string(),
    }))
}

async fn session_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<TransferResponse> {
    let outcome = state
        .session
        .send_tokens(&request.recipient, &request.amount)
        .await
        .map_err(session_error)?;

    Ok(Json(TransferResponse {
        tx_hash: outcome.tx_hash.0,
        token_balance: outcome.balance.map(|b| b.to_string()),
    }))
}

fn session_error(error: SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        SessionError::InvalidInput { .. } | SessionError::InvalidAmount(_) => {
            StatusCode::BAD_REQUEST
        }
        SessionError::NotConnected | SessionError::OperationInProgress => StatusCode::CONFLICT,
        SessionError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::UserRejected(_)
        | SessionError::ProviderError(_)
        | SessionError::LedgerQueryFailed(_)
        | SessionError::TransferRejected(_)
        | SessionError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            kind: error.kind(),
        }),
    )
}
