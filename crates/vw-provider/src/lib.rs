//! Wallet provider gateway.
//!
//! The provider holds the user's accounts and signs/submits transactions on
//! their behalf. The session core only sees the [`Provider`] trait; whether
//! the gateway is a node with unlocked accounts or a test double is decided
//! at construction time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vw_api_types::{AccountAddress, TxHash};

/// EIP-1193 error code for a request declined by the user in the wallet UI.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Unsigned transaction handed to the provider for signing and submission.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub from: AccountAddress,
    pub to: AccountAddress,
    /// 0x-prefixed calldata.
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderFailure {
    /// The user declined the request in the wallet UI.
    #[error("rejected in the wallet: {0}")]
    Rejected(String),
    #[error("provider error: {0}")]
    Other(String),
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Requests access to the user's accounts. May prompt the user and may
    /// be declined.
    async fn request_accounts(&self) -> Result<Vec<AccountAddress>, ProviderFailure>;

    /// Signs `request` on behalf of `request.from` and submits it. Suspends
    /// until the user confirms or declines and the network answers.
    async fn sign_and_send(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, ProviderFailure>;
}

// ── JSON-RPC wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

fn classify_rpc_error(error: RpcErrorBody) -> ProviderFailure {
    if error.code == USER_REJECTED_CODE {
        ProviderFailure::Rejected(error.message)
    } else {
        ProviderFailure::Other(format!("rpc error {}: {}", error.code, error.message))
    }
}

/// JSON-RPC provider backed by a node that holds the user's accounts.
///
/// Reads `VERTAWALLET_PROVIDER_URL` from the environment at construction
/// time; [`RpcProvider::detect`] is the capability probe — it yields `None`
/// when no provider endpoint is configured, so callers get a typed
/// "unavailable" outcome instead of a failing request later.
pub struct RpcProvider {
    endpoint: String,
    http: reqwest::Client,
}

impl RpcProvider {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn detect() -> Option<Self> {
        std::env::var("VERTAWALLET_PROVIDER_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(Self::new)
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("provider {method} transport"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("provider {method} HTTP {status}: {text}");
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("provider {method} parse"))?;

        if let Some(error) = parsed.error {
            return Err(classify_rpc_error(error).into());
        }

        parsed
            .result
            .ok_or_else(|| anyhow::anyhow!("provider {method} returned no result"))
    }
}

/// Pulls the typed failure back out of an adapter-level error, defaulting
/// to `Other` for transport and parse problems.
fn to_failure(err: anyhow::Error) -> ProviderFailure {
    match err.downcast::<ProviderFailure>() {
        Ok(failure) => failure,
        Err(other) => ProviderFailure::Other(format!("{other:#}")),
    }
}

#[async_trait]
impl Provider for RpcProvider {
    async fn request_accounts(&self) -> Result<Vec<AccountAddress>, ProviderFailure> {
        let result = self
            .call("eth_accounts", serde_json::json!([]))
            .await
            .map_err(to_failure)?;

        let accounts: Vec<String> = serde_json::from_value(result)
            .map_err(|err| ProviderFailure::Other(format!("account list parse: {err}")))?;

        debug!(count = accounts.len(), "provider returned accounts");
        Ok(accounts.into_iter().map(AccountAddress).collect())
    }

    async fn sign_and_send(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, ProviderFailure> {
        let params = serde_json::json!([{
            "from": request.from.0,
            "to": request.to.0,
            "data": request.data,
        }]);

        let result = self
            .call("eth_sendTransaction", params)
            .await
            .map_err(to_failure)?;

        let tx_hash: String = serde_json::from_value(result)
            .map_err(|err| ProviderFailure::Other(format!("tx hash parse: {err}")))?;

        Ok(TransactionReceipt {
            tx_hash: TxHash(tx_hash),
        })
    }
}
