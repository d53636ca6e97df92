//! An in-memory [`Connection`] so tests and demos run without a validator.
//!
//! Reads behave like the RPC transport over a plain account map, including
//! memcmp/data-size filtering and slice projection. Writes are recorded, not
//! executed; assertions inspect the sent transactions directly.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use async_trait::async_trait;
use solana_account::Account;
use solana_address::Address;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash,
    signature::Signature,
    transaction::Transaction,
};

use crate::{
    accounts::{
        KeyedAccount,
        ProgramScan,
    },
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<Address, Account>,
    sent: Vec<Transaction>,
    confirm_polls_remaining: u8,
    fail_batches: bool,
    next_signature: u64,
}

pub struct MemoryConnection {
    state: Mutex<MemoryState>,
    commitment: CommitmentConfig,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            commitment: CommitmentConfig::processed(),
        }
    }
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = (Address, Account)>) -> Self {
        let connection = Self::new();
        for (address, account) in accounts {
            connection.set_account(address, account);
        }
        connection
    }

    pub fn set_account(&self, address: Address, account: Account) {
        self.lock().accounts.insert(address, account);
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.lock().accounts.get(address).cloned()
    }

    /// Every transaction accepted so far, in submission order.
    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.lock().sent.clone()
    }

    /// Makes the next `polls` confirmation checks report "not yet".
    pub fn require_confirm_polls(&self, polls: u8) {
        self.lock().confirm_polls_remaining = polls;
    }

    /// Makes every batch read fail until turned off again.
    pub fn fail_batches(&self, fail: bool) {
        self.lock().fail_batches = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory connection lock")
    }

    fn next_signature(state: &mut MemoryState) -> Signature {
        state.next_signature += 1;
        let mut bytes = [0u8; 64];
        bytes[..8].copy_from_slice(&state.next_signature.to_le_bytes());
        Signature::from(bytes)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    async fn get_account(
        &self,
        address: &Address,
        _commitment: CommitmentConfig,
    ) -> ClientResult<Option<Account>> {
        Ok(self.lock().accounts.get(address).cloned())
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
        _commitment: CommitmentConfig,
    ) -> ClientResult<Vec<Option<Account>>> {
        let state = self.lock();
        if state.fail_batches {
            return Err(ClientError::Connection("injected batch failure".into()));
        }
        Ok(addresses
            .iter()
            .map(|address| state.accounts.get(address).cloned())
            .collect())
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        scan: ProgramScan,
    ) -> ClientResult<Vec<KeyedAccount>> {
        let state = self.lock();
        Ok(state
            .accounts
            .iter()
            .filter(|(_, account)| account.owner == *program)
            .filter(|(_, account)| scan.filters.iter().all(|filter| filter.matches(&account.data)))
            .map(|(address, account)| {
                let mut account = account.clone();
                if let Some(slice) = scan.slice {
                    account.data = slice.apply(&account.data);
                }
                KeyedAccount {
                    address: *address,
                    account,
                }
            })
            .collect())
    }

    async fn get_latest_blockhash(&self) -> ClientResult<Hash> {
        Ok(Hash::default())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> ClientResult<Signature> {
        let mut state = self.lock();
        state.sent.push(transaction.clone());
        Ok(Self::next_signature(&mut state))
    }

    async fn confirm_transaction(&self, _signature: &Signature) -> ClientResult<bool> {
        let mut state = self.lock();
        if state.confirm_polls_remaining > 0 {
            state.confirm_polls_remaining -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn request_airdrop(&self, address: &Address, lamports: u64) -> ClientResult<Signature> {
        let mut state = self.lock();
        state
            .accounts
            .entry(*address)
            .or_insert_with(|| Account::new(0, 0, &solana_system_interface::program::ID))
            .lamports += lamports;
        Ok(Self::next_signature(&mut state))
    }
}
