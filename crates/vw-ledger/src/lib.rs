//! Token ledger interface.
//!
//! A ledger exposes balance lookup and transfer for a single token. The
//! read path talks to the chain directly; the write path goes through the
//! wallet provider, which signs and submits on the sender's behalf.

use async_trait::async_trait;
use vw_api_types::AccountAddress;
use vw_provider::TransactionReceipt;

mod erc20;
pub mod units;

pub use erc20::{Erc20Ledger, VERTACOIN_DECIMALS, VERTACOIN_TOKEN_ADDRESS};
pub use units::TokenAmount;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Balance lookup failed (transport, node, or contract error).
    #[error("ledger query failed: {0}")]
    Query(String),
    /// Transfer submission was not accepted by the ledger.
    #[error("transfer submission failed: {0}")]
    Submit(String),
    /// The provider declined to sign the transfer.
    #[error("signing rejected: {0}")]
    SignerRejected(String),
}

#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Fixed decimal precision declared by the token contract.
    fn decimals(&self) -> u8;

    /// Balance of `account` in the ledger's smallest integer unit.
    async fn balance_of(&self, account: &AccountAddress) -> Result<u128, LedgerError>;

    /// Transfers `amount_base_units` from `from` to `recipient`, signed by
    /// the provider on behalf of `from`.
    async fn transfer(
        &self,
        from: &AccountAddress,
        recipient: &AccountAddress,
        amount_base_units: u128,
    ) -> Result<TransactionReceipt, LedgerError>;
}
