//! ERC-20 adapter for the Vertacoin token contract.
//!
//! Reads go straight to a JSON-RPC node via `eth_call`; writes build the
//! `transfer(address,uint256)` calldata and hand it to the wallet provider,
//! which signs and submits on the sender's behalf.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use vw_api_types::AccountAddress;
use vw_provider::{Provider, ProviderFailure, TransactionReceipt, TransactionRequest};

use crate::{LedgerError, TokenLedger};

/// Deployed Vertacoin token contract.
pub const VERTACOIN_TOKEN_ADDRESS: &str = "0xebc5942d0053B1acEfF18B01086272667209Df5b";
/// Decimal precision declared by the contract.
pub const VERTACOIN_DECIMALS: u8 = 18;

// Standard ERC-20 function selectors.
const BALANCE_OF_SELECTOR: &str = "70a08231";
const TRANSFER_SELECTOR: &str = "a9059cbb";

/// JSON-RPC adapter for the Vertacoin ERC-20 contract.
///
/// Reads `VERTACOIN_RPC_URL` from the environment at construction time
/// (default: `http://localhost:8545`).
pub struct Erc20Ledger {
    endpoint: String,
    token_address: String,
    decimals: u8,
    http: reqwest::Client,
    provider: Option<Arc<dyn Provider>>,
}

impl Erc20Ledger {
    pub fn new(provider: Option<Arc<dyn Provider>>, endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("VERTACOIN_RPC_URL").ok())
            .unwrap_or_else(|| "http://localhost:8545".to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_address: VERTACOIN_TOKEN_ADDRESS.to_owned(),
            decimals: VERTACOIN_DECIMALS,
            http: reqwest::Client::new(),
            provider,
        }
    }

    async fn eth_call(&self, data: String) -> Result<String> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: serde_json::json!([
                { "to": self.token_address, "data": data },
                "latest",
            ]),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("eth_call transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("eth_call HTTP {status}: {text}");
        }

        let parsed: RpcResponse = response.json().await.context("eth_call parse")?;
        if let Some(error) = parsed.error {
            anyhow::bail!("eth_call rpc error {}: {}", error.code, error.message);
        }

        parsed
            .result
            .ok_or_else(|| anyhow::anyhow!("eth_call returned no result"))
    }
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
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

// ── ABI encoding helpers ─────────────────────────────────────────────

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Left-pads a 20-byte address to a 32-byte ABI word.
fn pad_address(address: &str) -> Result<String, LedgerError> {
    let hex = strip_hex_prefix(address);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LedgerError::Submit(format!(
            "invalid address format: {address}"
        )));
    }
    Ok(format!("{:0>64}", hex.to_ascii_lowercase()))
}

fn pad_amount(amount: u128) -> String {
    format!("{amount:064x}")
}

fn encode_balance_of(account: &str) -> Result<String, LedgerError> {
    let account = pad_address(account).map_err(|_| {
        LedgerError::Query(format!("invalid address format: {account}"))
    })?;
    Ok(format!("0x{BALANCE_OF_SELECTOR}{account}"))
}

fn encode_transfer(recipient: &str, amount: u128) -> Result<String, LedgerError> {
    Ok(format!(
        "0x{TRANSFER_SELECTOR}{}{}",
        pad_address(recipient)?,
        pad_amount(amount)
    ))
}

/// Decodes a 0x-prefixed hex quantity into base units.
fn decode_quantity(raw: &str) -> Result<u128, LedgerError> {
    let hex = strip_hex_prefix(raw.trim());
    let hex = hex.trim_start_matches('0');
    if hex.is_empty() {
        return Ok(0);
    }
    if hex.len() > 32 {
        return Err(LedgerError::Query(
            "balance exceeds the supported range".to_owned(),
        ));
    }
    u128::from_str_radix(hex, 16)
        .map_err(|err| LedgerError::Query(format!("balance decode: {err}")))
}

#[async_trait]
impl TokenLedger for Erc20Ledger {
    fn decimals(&self) -> u8 {
        self.decimals
    }

    async fn balance_of(&self, account: &AccountAddress) -> Result<u128, LedgerError> {
        let data = encode_balance_of(&account.0)?;
        let result = self
            .eth_call(data)
            .await
            .map_err(|err| LedgerError::Query(format!("{err:#}")))?;

        let balance = decode_quantity(&result)?;
        debug!(account = %account, balance, "balance fetched");
        Ok(balance)
    }

    async fn transfer(
        &self,
        from: &AccountAddress,
        recipient: &AccountAddress,
        amount_base_units: u128,
    ) -> Result<TransactionReceipt, LedgerError> {
        let Some(provider) = &self.provider else {
            return Err(LedgerError::Submit(
                "no provider available to sign the transfer".to_owned(),
            ));
        };

        let request = TransactionRequest {
            from: from.clone(),
            to: AccountAddress(self.token_address.clone()),
            data: encode_transfer(&recipient.0, amount_base_units)?,
        };

        let receipt = provider
            .sign_and_send(request)
            .await
            .map_err(|failure| match failure {
                ProviderFailure::Rejected(message) => LedgerError::SignerRejected(message),
                ProviderFailure::Other(message) => LedgerError::Submit(message),
            })?;

        debug!(tx_hash = %receipt.tx_hash, "transfer submitted");
        Ok(receipt)
    }
}
