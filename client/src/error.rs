//! Typed error taxonomy for the SDK. Transport errors pass through unchanged.

use solana_address::Address;
use solana_client::client_error::ClientError as RpcClientError;
use solana_sdk::{
    signature::Signature,
    signer::SignerError,
};
use thiserror::Error;

use crate::scope::CancellationReason;

pub type ClientResult<T> = Result<T, ClientError>;

/// Every failure the SDK itself can produce.
///
/// Nothing here is retried internally; each error surfaces to the immediate
/// caller, which owns any retry policy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dispatch was requested for an operation key nobody registered.
    #[error("no handler registered for operation `{key}`")]
    HandlerMissing { key: String },

    /// The operation input did not match the registered handler's input type.
    #[error("input for operation `{key}` does not match its registered handler")]
    OperationInputMismatch { key: &'static str },

    /// The handler produced a value that does not match the operation's
    /// declared output type.
    #[error("output of operation `{key}` does not match its declared type")]
    OperationOutputMismatch { key: &'static str },

    /// A read succeeded but the account does not exist.
    #[error("account {address} not found")]
    AccountNotFound { address: Address },

    /// A read succeeded but the account data is not shaped as expected.
    #[error("account {address} holds unexpected data: {reason}")]
    UnexpectedAccountData { address: Address, reason: String },

    /// A transaction was assembled without a designated fee payer.
    #[error("transaction builder has no fee payer")]
    MissingFeePayer,

    /// A signer was supplied whose address the assembled message does not
    /// require a signature from.
    #[error("signer {address} is not required by the assembled message")]
    UnexpectedSigner { address: Address },

    /// A batch read came back with a different number of slots than addresses
    /// requested, which would corrupt index alignment.
    #[error("batch read returned {received} accounts, expected {expected}")]
    MalformedBatchResponse { expected: usize, received: usize },

    /// A submitted transaction was accepted but never confirmed within the
    /// polling budget.
    #[error("transaction {signature} was not confirmed after {tries} polls")]
    Unconfirmed { signature: Signature, tries: u8 },

    /// The operation's scope was canceled; carries the stored reason.
    #[error(transparent)]
    Canceled(#[from] CancellationReason),

    /// A submitted transaction failed with a custom program error that was
    /// resolved against the program registry.
    #[error("program `{program}` failed with custom error {code:#x}")]
    Program {
        program: String,
        code: u32,
        label: Option<String>,
        #[source]
        source: Box<RpcClientError>,
    },

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Rpc(#[from] RpcClientError),

    /// A failure defined by a particular [`Connection`](crate::connection::Connection)
    /// implementation rather than the RPC transport.
    #[error("connection failure: {0}")]
    Connection(String),
}
