//! The connection capability: the seam between the SDK's builders and
//! whatever actually serves reads and takes transactions.

use async_trait::async_trait;
use solana_account::Account;
use solana_account_decoder_client_types::UiDataSliceConfig;
use solana_address::Address;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{
        RpcAccountInfoConfig,
        RpcProgramAccountsConfig,
        UiAccountEncoding,
    },
    rpc_filter::{
        Memcmp,
        RpcFilterType,
    },
};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash,
    signature::Signature,
    transaction::Transaction,
};

use crate::{
    accounts::{
        AccountFilter,
        KeyedAccount,
        ProgramScan,
    },
    error::ClientResult,
    logs::{
        LogEntry,
        LogHue,
    },
};

/// Every read and write the SDK performs goes through this trait. The RPC
/// transport is one implementation; tests substitute an in-memory one.
///
/// Implementations surface their own failures; nothing here retries.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The commitment used when a caller does not specify one.
    fn commitment(&self) -> CommitmentConfig;

    async fn get_account(
        &self,
        address: &Address,
        commitment: CommitmentConfig,
    ) -> ClientResult<Option<Account>>;

    /// One batch read. Slot `i` of the result corresponds to `addresses[i]`.
    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
        commitment: CommitmentConfig,
    ) -> ClientResult<Vec<Option<Account>>>;

    /// Scans every account owned by `program`, narrowed by the scan's
    /// filters and optionally projected to a byte range. No ordering is
    /// guaranteed.
    async fn get_program_accounts(
        &self,
        program: &Address,
        scan: ProgramScan,
    ) -> ClientResult<Vec<KeyedAccount>>;

    async fn get_latest_blockhash(&self) -> ClientResult<Hash>;

    async fn send_transaction(&self, transaction: &Transaction) -> ClientResult<Signature>;

    async fn confirm_transaction(&self, signature: &Signature) -> ClientResult<bool>;

    async fn request_airdrop(&self, address: &Address, lamports: u64) -> ClientResult<Signature>;
}

#[derive(Clone)]
pub struct ConnectionConfig {
    pub commitment: CommitmentConfig,
    pub debug_logs: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            commitment: CommitmentConfig::confirmed(),
            debug_logs: false,
        }
    }
}

/// [`Connection`] over the nonblocking RPC client.
pub struct RpcConnection {
    pub client: RpcClient,
    pub config: ConnectionConfig,
}

const DEFAULT_RPC_URL: &str = "http://localhost:8899";

impl Default for RpcConnection {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl RpcConnection {
    /// A missing client is built at the *merged* config's commitment, so the
    /// calls that carry no explicit commitment (blockhash, send, confirm,
    /// airdrop) run at the same level the config reports.
    pub fn new(client: Option<RpcClient>, config: Option<ConnectionConfig>) -> Self {
        let config = config.unwrap_or_default();
        let client = client.unwrap_or_else(|| {
            RpcClient::new_with_commitment(DEFAULT_RPC_URL.into(), config.commitment)
        });
        Self { client, config }
    }

    pub fn new_from_url(url: &str, config: ConnectionConfig) -> Self {
        RpcConnection {
            client: RpcClient::new_with_commitment(url.into(), config.commitment),
            config,
        }
    }
}

fn to_rpc_filter(filter: &AccountFilter) -> RpcFilterType {
    match filter {
        AccountFilter::Memcmp { offset, bytes } => {
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(*offset, bytes.clone()))
        }
        AccountFilter::DataSize(size) => RpcFilterType::DataSize(*size),
    }
}

#[async_trait]
impl Connection for RpcConnection {
    fn commitment(&self) -> CommitmentConfig {
        self.config.commitment
    }

    async fn get_account(
        &self,
        address: &Address,
        commitment: CommitmentConfig,
    ) -> ClientResult<Option<Account>> {
        Ok(self
            .client
            .get_account_with_commitment(address, commitment)
            .await?
            .value)
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
        commitment: CommitmentConfig,
    ) -> ClientResult<Vec<Option<Account>>> {
        Ok(self
            .client
            .get_multiple_accounts_with_commitment(addresses, commitment)
            .await?
            .value)
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        scan: ProgramScan,
    ) -> ClientResult<Vec<KeyedAccount>> {
        let config = RpcProgramAccountsConfig {
            filters: (!scan.filters.is_empty())
                .then(|| scan.filters.iter().map(to_rpc_filter).collect()),
            account_config: RpcAccountInfoConfig {
                commitment: Some(scan.commitment.unwrap_or(self.config.commitment)),
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: scan.slice.map(|slice| UiDataSliceConfig {
                    offset: slice.offset,
                    length: slice.length,
                }),
                min_context_slot: None,
            },
            with_context: None,
            sort_results: None,
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(program, config)
            .await?;

        Ok(accounts
            .into_iter()
            .map(|(address, account)| KeyedAccount { address, account })
            .collect())
    }

    async fn get_latest_blockhash(&self) -> ClientResult<Hash> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> ClientResult<Signature> {
        let signature = self.client.send_transaction(transaction).await?;
        if self.config.debug_logs {
            LogEntry::new("Sent transaction", signature)
                .hue(LogHue::Info)
                .log();
        }
        Ok(signature)
    }

    async fn confirm_transaction(&self, signature: &Signature) -> ClientResult<bool> {
        Ok(self.client.confirm_transaction(signature).await?)
    }

    async fn request_airdrop(&self, address: &Address, lamports: u64) -> ClientResult<Signature> {
        Ok(self.client.request_airdrop(address, lamports).await?)
    }
}
