//! Wallet session core.
//!
//! A [`WalletSession`] is the relationship between the page and a connected
//! wallet account: three operations (`connect`, `refresh_balance`,
//! `send_tokens`) over two injected collaborators (the wallet
//! [`Provider`] and the [`TokenLedger`]), with an explicit status machine
//! governing which operation is permitted when.
//!
//! Failures from the collaborators are classified into [`SessionError`] at
//! the operation boundary and surfaced both as the typed return value and
//! as `last_error` in the session snapshot; nothing is passed through raw
//! and nothing crashes the session. Overlapping operations are rejected,
//! never queued.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use vw_api_types::{AccountAddress, TxHash};
use vw_ledger::{LedgerError, TokenAmount, TokenLedger, units};
use vw_provider::{Provider, ProviderFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Sending,
    TransactionSucceeded,
    TransactionFailed,
}

impl SessionStatus {
    /// An operation is in flight; new operations are rejected.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Connecting | Self::Sending)
    }

    /// Terminal for one transfer attempt; the next accepted operation
    /// returns the session to `Connected` first.
    pub fn is_attempt_terminal(self) -> bool {
        matches!(self, Self::TransactionSucceeded | Self::TransactionFailed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Sending => "sending",
            Self::TransactionSucceeded => "transaction_succeeded",
            Self::TransactionFailed => "transaction_failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Recipient,
    Amount,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipient => f.write_str("recipient"),
            Self::Amount => f.write_str("amount"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no wallet provider is available")]
    ProviderUnavailable,
    #[error("connection rejected in the wallet: {0}")]
    UserRejected(String),
    #[error("wallet provider error: {0}")]
    ProviderError(String),
    #[error("no wallet is connected")]
    NotConnected,
    #[error("balance query failed: {0}")]
    LedgerQueryFailed(String),
    #[error("{field} is required")]
    InvalidInput { field: InputField },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("transfer rejected in the wallet: {0}")]
    TransferRejected(String),
    #[error("transfer failed: {0}")]
    TransferFailed(String),
    #[error("another wallet operation is in progress")]
    OperationInProgress,
}

impl SessionError {
    /// Stable machine-readable tag for the page layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::UserRejected(_) => "user_rejected",
            Self::ProviderError(_) => "provider_error",
            Self::NotConnected => "not_connected",
            Self::LedgerQueryFailed(_) => "ledger_query_failed",
            Self::InvalidInput { .. } => "invalid_input",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::TransferRejected(_) => "transfer_rejected",
            Self::TransferFailed(_) => "transfer_failed",
            Self::OperationInProgress => "operation_in_progress",
        }
    }
}

fn classify_connect_failure(failure: ProviderFailure) -> SessionError {
    match failure {
        ProviderFailure::Rejected(message) => SessionError::UserRejected(message),
        ProviderFailure::Other(message) => SessionError::ProviderError(message),
    }
}

fn classify_transfer_failure(failure: LedgerError) -> SessionError {
    match failure {
        LedgerError::SignerRejected(message) => SessionError::TransferRejected(message),
        LedgerError::Query(message) | LedgerError::Submit(message) => {
            SessionError::TransferFailed(message)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    status: SessionStatus,
    account: Option<AccountAddress>,
    balance: Option<TokenAmount>,
    last_error: Option<SessionError>,
}

/// Point-in-time copy of the session state for the page layer to render.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub account: Option<AccountAddress>,
    pub balance: Option<TokenAmount>,
    pub last_error: Option<SessionError>,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub tx_hash: TxHash,
    /// Refreshed balance; `None` when the post-transfer refresh failed and
    /// the balance is still stale.
    pub balance: Option<TokenAmount>,
}

pub struct WalletSession {
    provider: Option<Arc<dyn Provider>>,
    ledger: Arc<dyn TokenLedger>,
    state: Mutex<SessionState>,
}

impl WalletSession {
    /// Creates a disconnected session. `provider` is the probed wallet
    /// capability; `None` makes every `connect` report
    /// [`SessionError::ProviderUnavailable`].
    pub fn new(provider: Option<Arc<dyn Provider>>, ledger: Arc<dyn TokenLedger>) -> Self {
        Self {
            provider,
            ledger,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            status: state.status,
            account: state.account.clone(),
            balance: state.balance,
            last_error: state.last_error.clone(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    // The lock is only ever taken for field updates, never across an await
    // point, so a poisoned mutex can only hold consistent state.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Connects to the wallet provider and binds the first account it
    /// returns, then fetches that account's balance.
    ///
    /// Re-connecting from a settled state restarts the flow; a busy session
    /// rejects the call untouched.
    pub async fn connect(&self) -> Result<AccountAddress, SessionError> {
        let provider = {
            let mut state = self.lock();
            if state.status.is_busy() {
                return Err(SessionError::OperationInProgress);
            }
            let Some(provider) = self.provider.clone() else {
                state.status = SessionStatus::Disconnected;
                state.account = None;
                state.balance = None;
                state.last_error = Some(SessionError::ProviderUnavailable);
                return Err(SessionError::ProviderUnavailable);
            };
            state.status = SessionStatus::Connecting;
            state.account = None;
            state.balance = None;
            state.last_error = None;
            provider
        };

        let accounts = match provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(failure) => {
                warn!(%failure, "wallet connection failed");
                return Err(self.fail_connect(classify_connect_failure(failure)));
            }
        };

        let Some(account) = accounts.into_iter().next() else {
            return Err(self.fail_connect(SessionError::ProviderError(
                "provider returned no accounts".to_owned(),
            )));
        };

        {
            let mut state = self.lock();
            state.status = SessionStatus::Connected;
            state.account = Some(account.clone());
        }
        debug!(account = %account, "wallet connected");

        // Initial balance population. A fetch failure is non-fatal to the
        // connection; it is recorded in last_error with the balance left
        // unset.
        if let Err(error) = self.fetch_balance(&account).await {
            warn!(%error, "initial balance fetch failed");
        }

        Ok(account)
    }

    /// Re-queries the ledger for the connected account's balance.
    pub async fn refresh_balance(&self) -> Result<TokenAmount, SessionError> {
        let account = self.begin_settled_operation()?;
        self.fetch_balance(&account).await
    }

    /// Transfers `amount` (a positive decimal string in the token's
    /// human-readable unit) to `recipient`.
    ///
    /// On ledger acceptance the session lands in `TransactionSucceeded` and
    /// the balance is re-fetched once; on any failure it lands in
    /// `TransactionFailed` with the pre-attempt balance kept. Either
    /// terminal state admits the next operation.
    pub async fn send_tokens(
        &self,
        recipient: &str,
        amount: &str,
    ) -> Result<TransferOutcome, SessionError> {
        let from = self.begin_settled_operation()?;

        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(self.record(SessionError::InvalidInput {
                field: InputField::Recipient,
            }));
        }
        let amount = amount.trim();
        if amount.is_empty() {
            return Err(self.record(SessionError::InvalidInput {
                field: InputField::Amount,
            }));
        }

        let base_units = match units::parse_decimal(amount, self.ledger.decimals()) {
            Ok(base_units) => base_units,
            Err(error) => return Err(self.record(SessionError::InvalidAmount(error.to_string()))),
        };

        self.lock().status = SessionStatus::Sending;
        debug!(recipient, amount, "submitting token transfer");

        let recipient = AccountAddress(recipient.to_owned());
        match self.ledger.transfer(&from, &recipient, base_units).await {
            Ok(receipt) => {
                {
                    let mut state = self.lock();
                    state.status = SessionStatus::TransactionSucceeded;
                    // Stale until re-fetched.
                    state.balance = None;
                }
                debug!(tx_hash = %receipt.tx_hash, "transfer accepted");
                let balance = self.fetch_balance(&from).await.ok();
                Ok(TransferOutcome {
                    tx_hash: receipt.tx_hash,
                    balance,
                })
            }
            Err(failure) => {
                warn!(%failure, "transfer failed");
                let error = classify_transfer_failure(failure);
                let mut state = self.lock();
                state.status = SessionStatus::TransactionFailed;
                state.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Entry check shared by `refresh_balance` and `send_tokens`: rejects a
    /// busy session, folds a terminal-of-attempt status back to
    /// `Connected`, requires a bound account, and clears `last_error` for
    /// the accepted operation.
    fn begin_settled_operation(&self) -> Result<AccountAddress, SessionError> {
        let mut state = self.lock();
        if state.status.is_busy() {
            return Err(SessionError::OperationInProgress);
        }
        if state.status.is_attempt_terminal() {
            state.status = SessionStatus::Connected;
        }
        let Some(account) = state.account.clone() else {
            state.last_error = Some(SessionError::NotConnected);
            return Err(SessionError::NotConnected);
        };
        state.last_error = None;
        Ok(account)
    }

    /// Updates the balance without touching `status`, so the internal
    /// refreshes triggered by `connect` and a successful transfer leave
    /// the operation's own transition visible.
    async fn fetch_balance(&self, account: &AccountAddress) -> Result<TokenAmount, SessionError> {
        match self.ledger.balance_of(account).await {
            Ok(base_units) => {
                let amount = TokenAmount::from_base_units(base_units, self.ledger.decimals());
                self.lock().balance = Some(amount);
                Ok(amount)
            }
            Err(failure) => {
                let error = SessionError::LedgerQueryFailed(failure.to_string());
                self.lock().last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    fn fail_connect(&self, error: SessionError) -> SessionError {
        let mut state = self.lock();
        state.status = SessionStatus::Disconnected;
        state.account = None;
        state.last_error = Some(error.clone());
        error
    }

    fn record(&self, error: SessionError) -> SessionError {
        self.lock().last_error = Some(error.clone());
        error
    }
}
