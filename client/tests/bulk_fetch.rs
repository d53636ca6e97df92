//! Order preservation, chunking transparency, and failure semantics of the
//! bulk account fetcher.

use async_trait::async_trait;
use itertools::Itertools;
use sextant_client::{
    accounts::{
        KeyedAccount,
        ProgramScan,
    },
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
    gma::GmaBuilder,
    memory::MemoryConnection,
};
use solana_account::Account;
use solana_address::Address;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash,
    signature::Signature,
    transaction::Transaction,
};

const OWNER: Address = solana_system_interface::program::ID;

/// Seeds `total` addresses, every third of which exists with its index as
/// its lamport balance.
fn seeded(total: usize) -> (MemoryConnection, Vec<Address>) {
    let addresses = (0..total).map(|_| Address::new_unique()).collect_vec();
    let connection = MemoryConnection::with_accounts(
        addresses
            .iter()
            .enumerate()
            .filter(|(index, _)| index % 3 == 0)
            .map(|(index, address)| (*address, Account::new(index as u64, 0, &OWNER))),
    );
    (connection, addresses)
}

#[tokio::test]
async fn tags_existence_in_original_order() {
    let (connection, addresses) = seeded(3);
    // Only the first of the three exists; reorder so the existing one sits
    // in the middle.
    let reordered = vec![addresses[1], addresses[0], addresses[2]];

    let slots = GmaBuilder::new(&connection, reordered.clone()).get().await.unwrap();
    assert_eq!(slots.len(), 3);
    assert!(!slots[0].exists());
    assert!(slots[1].exists());
    assert!(!slots[2].exists());
    for (slot, address) in slots.iter().zip(&reordered) {
        assert_eq!(slot.address(), address);
    }
}

#[tokio::test]
async fn chunk_size_is_not_observable_in_the_result() {
    let (connection, addresses) = seeded(250);

    for chunk_size in [1, 7, 100, 1000] {
        let slots = GmaBuilder::new(&connection, addresses.clone())
            .with_chunk_size(chunk_size)
            .get()
            .await
            .unwrap();

        assert_eq!(slots.len(), 250);
        for (index, (slot, address)) in slots.iter().zip(&addresses).enumerate() {
            assert_eq!(slot.address(), address);
            if index % 3 == 0 {
                assert_eq!(slot.account().unwrap().lamports, index as u64);
            } else {
                assert!(!slot.exists());
            }
        }
    }
}

#[tokio::test]
async fn one_failed_chunk_fails_the_whole_call() {
    let (connection, addresses) = seeded(10);
    connection.fail_batches(true);

    let result = GmaBuilder::new(&connection, addresses)
        .with_chunk_size(3)
        .get()
        .await;
    assert!(matches!(result, Err(ClientError::Connection(_))));
}

#[tokio::test]
async fn pagination_narrows_before_fetching() {
    let (connection, addresses) = seeded(10);
    let fetcher = GmaBuilder::new(&connection, addresses.clone());

    let first = fetcher.get_first(3).await.unwrap();
    assert_eq!(
        first.iter().map(|slot| *slot.address()).collect_vec(),
        addresses[..3]
    );

    let last = fetcher.get_last(4).await.unwrap();
    assert_eq!(
        last.iter().map(|slot| *slot.address()).collect_vec(),
        addresses[6..]
    );

    let between = fetcher.get_between(2, 5).await.unwrap();
    assert_eq!(
        between.iter().map(|slot| *slot.address()).collect_vec(),
        addresses[2..5]
    );

    // Pages are 1-indexed.
    let page = fetcher.get_page(2, 4).await.unwrap();
    assert_eq!(
        page.iter().map(|slot| *slot.address()).collect_vec(),
        addresses[4..8]
    );

    assert!(fetcher.get_page(9, 4).await.unwrap().is_empty());
    assert_eq!(fetcher.get_first(99).await.unwrap().len(), 10);
}

/// A connection that drops the last slot of every batch, violating index
/// alignment.
struct TruncatingConnection(MemoryConnection);

#[async_trait]
impl Connection for TruncatingConnection {
    fn commitment(&self) -> CommitmentConfig {
        self.0.commitment()
    }

    async fn get_account(
        &self,
        address: &Address,
        commitment: CommitmentConfig,
    ) -> ClientResult<Option<Account>> {
        self.0.get_account(address, commitment).await
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
        commitment: CommitmentConfig,
    ) -> ClientResult<Vec<Option<Account>>> {
        let mut accounts = self.0.get_multiple_accounts(addresses, commitment).await?;
        accounts.pop();
        Ok(accounts)
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        scan: ProgramScan,
    ) -> ClientResult<Vec<KeyedAccount>> {
        self.0.get_program_accounts(program, scan).await
    }

    async fn get_latest_blockhash(&self) -> ClientResult<Hash> {
        self.0.get_latest_blockhash().await
    }

    async fn send_transaction(&self, transaction: &Transaction) -> ClientResult<Signature> {
        self.0.send_transaction(transaction).await
    }

    async fn confirm_transaction(&self, signature: &Signature) -> ClientResult<bool> {
        self.0.confirm_transaction(signature).await
    }

    async fn request_airdrop(&self, address: &Address, lamports: u64) -> ClientResult<Signature> {
        self.0.request_airdrop(address, lamports).await
    }
}

#[tokio::test]
async fn a_misaligned_batch_response_is_a_typed_error() {
    let (memory, addresses) = seeded(4);
    let connection = TruncatingConnection(memory);

    let result = GmaBuilder::new(&connection, addresses).get().await;
    assert!(matches!(
        result,
        Err(ClientError::MalformedBatchResponse {
            expected: 4,
            received: 3,
        })
    ));
}
