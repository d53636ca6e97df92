//! Filter-composition builder over a program's accounts.
//!
//! Filters are conjunctive and the transport gives no ordering guarantee, so
//! any required ordering is established client-side via [`GpaBuilder::sort_using`].

use std::{
    cmp::Ordering,
    sync::Arc,
};

use itertools::Itertools;
use solana_address::Address;
use solana_commitment_config::CommitmentConfig;

use crate::{
    accounts::{
        AccountFilter,
        DataSlice,
        FilterBytes,
        KeyedAccount,
        ProgramScan,
    },
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
};

type Comparator = dyn Fn(&KeyedAccount, &KeyedAccount) -> Ordering + Send + Sync;

/// Accumulates byte-offset predicates against one program's accounts and
/// executes the scan.
///
/// Builder calls consume and return the builder; the terminal [`get`] borrows
/// it, so one accumulated builder can be queried repeatedly. Cloning a
/// builder carries its filters and comparator, which is how a generic
/// builder is specialized with an account family's additional predicates
/// without re-deriving the shared ones.
///
/// [`get`]: GpaBuilder::get
pub struct GpaBuilder<'a, C: ?Sized> {
    connection: &'a C,
    program: Address,
    filters: Vec<AccountFilter>,
    slice: Option<DataSlice>,
    commitment: Option<CommitmentConfig>,
    comparator: Option<Arc<Comparator>>,
}

impl<C: ?Sized> Clone for GpaBuilder<'_, C> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection,
            program: self.program,
            filters: self.filters.clone(),
            slice: self.slice,
            commitment: self.commitment,
            comparator: self.comparator.clone(),
        }
    }
}

impl<'a, C: Connection + ?Sized> GpaBuilder<'a, C> {
    pub fn new(connection: &'a C, program: Address) -> Self {
        Self {
            connection,
            program,
            filters: Vec::new(),
            slice: None,
            commitment: None,
            comparator: None,
        }
    }

    /// Requires an exact byte match at `offset`. Integer comparands encode
    /// little-endian; a wrong offset or endianness silently yields zero
    /// matches rather than an error.
    pub fn memcmp(mut self, offset: usize, comparand: impl FilterBytes) -> Self {
        self.filters.push(AccountFilter::Memcmp {
            offset,
            bytes: comparand.filter_bytes(),
        });
        self
    }

    /// Requires an exact total account-data size. Cheap discriminator between
    /// account variants sharing a program, applied before field-level filters.
    pub fn data_size(mut self, size: u64) -> Self {
        self.filters.push(AccountFilter::DataSize(size));
        self
    }

    /// Projects each returned account to `length` bytes starting at `offset`.
    pub fn slice(mut self, offset: usize, length: usize) -> Self {
        self.slice = Some(DataSlice { offset, length });
        self
    }

    /// Drops account data entirely; for scans where only the addresses or
    /// the match count matter.
    pub fn without_data(self) -> Self {
        self.slice(0, 0)
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = Some(commitment);
        self
    }

    /// Orders the fetched pairs client-side after retrieval.
    pub fn sort_using(
        mut self,
        comparator: impl Fn(&KeyedAccount, &KeyedAccount) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Executes the scan with the accumulated state. Safe to invoke again on
    /// the same builder; accumulated state is only read.
    pub async fn get(&self) -> ClientResult<Vec<KeyedAccount>> {
        let scan = ProgramScan {
            filters: self.filters.clone(),
            slice: self.slice,
            commitment: self.commitment,
        };
        let mut accounts = self.connection.get_program_accounts(&self.program, scan).await?;
        if let Some(comparator) = &self.comparator {
            accounts.sort_by(|a, b| comparator(a, b));
        }
        Ok(accounts)
    }

    pub async fn get_and_map<T>(
        &self,
        map: impl FnMut(KeyedAccount) -> T,
    ) -> ClientResult<Vec<T>> {
        Ok(self.get().await?.into_iter().map(map).collect_vec())
    }

    /// Reads each matched account's (projected) data as one 32-byte address.
    /// Intended for scans sliced down to an address-valued field.
    pub async fn get_data_as_addresses(&self) -> ClientResult<Vec<Address>> {
        self.get()
            .await?
            .into_iter()
            .map(|keyed| {
                let bytes: [u8; 32] = keyed.account.data.as_slice().try_into().map_err(|_| {
                    ClientError::UnexpectedAccountData {
                        address: keyed.address,
                        reason: format!(
                            "expected 32 bytes of address data, got {}",
                            keyed.account.data.len()
                        ),
                    }
                })?;
                Ok(Address::new_from_array(bytes))
            })
            .collect()
    }
}
