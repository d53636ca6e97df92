//! Chunked bulk reads of an ordered address list.
//!
//! The transport caps how many accounts one batch read may resolve, so the
//! list is partitioned into chunks purely for transport compliance. Chunk
//! boundaries are never observable in the merged result, which preserves the
//! caller's original address order.

use futures::future::try_join_all;
use itertools::Itertools;
use solana_address::Address;
use solana_commitment_config::CommitmentConfig;

use crate::{
    accounts::MaybeAccount,
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
};

pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Resolves a potentially large ordered address list to existence-tagged
/// account slots.
///
/// A transport failure on any one chunk fails the whole call; partial
/// success would silently corrupt index alignment with the input order, so
/// the caller retries the entire fetch instead.
pub struct GmaBuilder<'a, C: ?Sized> {
    connection: &'a C,
    addresses: Vec<Address>,
    chunk_size: usize,
    commitment: Option<CommitmentConfig>,
}

impl<'a, C: Connection + ?Sized> GmaBuilder<'a, C> {
    pub fn new(connection: &'a C, addresses: Vec<Address>) -> Self {
        Self {
            connection,
            addresses,
            chunk_size: DEFAULT_CHUNK_SIZE,
            commitment: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = Some(commitment);
        self
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Fetches every address, in original order.
    pub async fn get(&self) -> ClientResult<Vec<MaybeAccount>> {
        self.fetch(&self.addresses).await
    }

    /// Fetches only the first `n` addresses. The list is narrowed before any
    /// I/O, so unrequested ranges cost nothing.
    pub async fn get_first(&self, n: usize) -> ClientResult<Vec<MaybeAccount>> {
        self.fetch(&self.addresses[..n.min(self.addresses.len())])
            .await
    }

    /// Fetches only the last `n` addresses.
    pub async fn get_last(&self, n: usize) -> ClientResult<Vec<MaybeAccount>> {
        let start = self.addresses.len().saturating_sub(n);
        self.fetch(&self.addresses[start..]).await
    }

    /// Fetches the half-open index range `[start, end)`, clamped to the list.
    pub async fn get_between(&self, start: usize, end: usize) -> ClientResult<Vec<MaybeAccount>> {
        let end = end.min(self.addresses.len());
        let start = start.min(end);
        self.fetch(&self.addresses[start..end]).await
    }

    /// Fetches one page of `per_page` addresses. Pages are 1-indexed: page 1
    /// is the first `per_page` addresses.
    pub async fn get_page(&self, page: usize, per_page: usize) -> ClientResult<Vec<MaybeAccount>> {
        let start = page.saturating_sub(1).saturating_mul(per_page);
        self.get_between(start, start.saturating_add(per_page))
            .await
    }

    async fn fetch(&self, addresses: &[Address]) -> ClientResult<Vec<MaybeAccount>> {
        let commitment = self.commitment.unwrap_or_else(|| self.connection.commitment());

        // Chunk reads are issued concurrently; `try_join_all` reassembles
        // them in chunk order and fails the whole call on the first error.
        let chunks = try_join_all(addresses.chunks(self.chunk_size).map(|chunk| async move {
            let accounts = self.connection.get_multiple_accounts(chunk, commitment).await?;
            if accounts.len() != chunk.len() {
                return Err(ClientError::MalformedBatchResponse {
                    expected: chunk.len(),
                    received: accounts.len(),
                });
            }
            Ok(chunk
                .iter()
                .zip(accounts)
                .map(|(address, account)| match account {
                    Some(account) => MaybeAccount::Found {
                        address: *address,
                        account,
                    },
                    None => MaybeAccount::Missing(*address),
                })
                .collect_vec())
        }))
        .await?;

        Ok(chunks.into_iter().flatten().collect())
    }
}
