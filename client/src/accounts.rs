//! Account and filter shapes shared by the query builders and the
//! [`Connection`](crate::connection::Connection) seam. These are in-memory
//! only and never persisted.

use solana_account::Account;
use solana_address::Address;
use solana_commitment_config::CommitmentConfig;

use crate::error::{
    ClientError,
    ClientResult,
};

/// An account paired with the address it lives at.
#[derive(Clone, Debug)]
pub struct KeyedAccount {
    pub address: Address,
    pub account: Account,
}

/// One slot of a bulk read. "Address has no account" is an ordinary outcome,
/// not an error; only transport failures surface as errors.
#[derive(Clone, Debug)]
pub enum MaybeAccount {
    Found { address: Address, account: Account },
    Missing(Address),
}

impl MaybeAccount {
    pub fn exists(&self) -> bool {
        matches!(self, MaybeAccount::Found { .. })
    }

    /// The address the slot was fetched for, whether or not it exists.
    pub fn address(&self) -> &Address {
        match self {
            MaybeAccount::Found { address, .. } => address,
            MaybeAccount::Missing(address) => address,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            MaybeAccount::Found { account, .. } => Some(account),
            MaybeAccount::Missing(_) => None,
        }
    }

    /// Converts the slot into a [`KeyedAccount`], surfacing a missing slot as
    /// a typed [`ClientError::AccountNotFound`].
    pub fn into_found(self) -> ClientResult<KeyedAccount> {
        match self {
            MaybeAccount::Found { address, account } => Ok(KeyedAccount { address, account }),
            MaybeAccount::Missing(address) => Err(ClientError::AccountNotFound { address }),
        }
    }
}

/// One predicate of a program scan. Filters combine conjunctively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountFilter {
    /// Exact byte match at `offset` into the account data.
    Memcmp { offset: usize, bytes: Vec<u8> },
    /// Exact total account-data size.
    DataSize(u64),
}

impl AccountFilter {
    /// Whether `data` satisfies the predicate. A memcmp whose window falls
    /// outside the buffer simply does not match.
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            AccountFilter::Memcmp { offset, bytes } => data
                .get(*offset..offset + bytes.len())
                .is_some_and(|window| window == bytes.as_slice()),
            AccountFilter::DataSize(size) => data.len() as u64 == *size,
        }
    }
}

/// A server-side byte-range projection of account data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataSlice {
    pub offset: usize,
    pub length: usize,
}

impl DataSlice {
    /// Applies the projection to a data buffer, clamping to its bounds.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        let start = self.offset.min(data.len());
        let end = (self.offset + self.length).min(data.len());
        data[start..end].to_vec()
    }
}

/// The accumulated shape of one program scan, handed to the connection.
#[derive(Clone, Debug, Default)]
pub struct ProgramScan {
    pub filters: Vec<AccountFilter>,
    pub slice: Option<DataSlice>,
    pub commitment: Option<CommitmentConfig>,
}

/// Conversion into the exact bytes a memcmp filter compares against.
///
/// Integers encode little-endian. Callers are responsible for matching the
/// target program's on-the-wire field layout exactly; a wrong offset or
/// endianness yields zero matches rather than an error.
pub trait FilterBytes {
    fn filter_bytes(self) -> Vec<u8>;
}

impl FilterBytes for Vec<u8> {
    fn filter_bytes(self) -> Vec<u8> {
        self
    }
}

impl FilterBytes for &[u8] {
    fn filter_bytes(self) -> Vec<u8> {
        self.to_vec()
    }
}

impl<const N: usize> FilterBytes for [u8; N] {
    fn filter_bytes(self) -> Vec<u8> {
        self.to_vec()
    }
}

impl FilterBytes for Address {
    fn filter_bytes(self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

impl FilterBytes for &Address {
    fn filter_bytes(self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

macro_rules! filter_bytes_le {
    ($($int:ty),*) => {
        $(
            impl FilterBytes for $int {
                fn filter_bytes(self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }
        )*
    };
}

filter_bytes_le!(u8, u16, u32, u64, u128);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_encode_little_endian() {
        assert_eq!(0x0102u16.filter_bytes(), vec![0x02, 0x01]);
        assert_eq!(1u64.filter_bytes(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(7u8.filter_bytes(), vec![7]);
    }

    #[test]
    fn address_encodes_as_its_canonical_bytes() {
        let address = Address::new_unique();
        assert_eq!(address.filter_bytes(), address.to_bytes().to_vec());
    }

    #[test]
    fn filter_bytes_round_trip_through_a_matching_buffer() {
        let owner = Address::new_unique();
        let nonce = 0xdead_beefu64;

        // A buffer laid out as [discriminant: u8 | owner: 32 | nonce: u64].
        let mut data = vec![3u8];
        data.extend_from_slice(&owner.to_bytes());
        data.extend_from_slice(&nonce.to_le_bytes());

        let by_tag = AccountFilter::Memcmp {
            offset: 0,
            bytes: 3u8.filter_bytes(),
        };
        let by_owner = AccountFilter::Memcmp {
            offset: 1,
            bytes: owner.filter_bytes(),
        };
        let by_nonce = AccountFilter::Memcmp {
            offset: 33,
            bytes: nonce.filter_bytes(),
        };
        assert!(by_tag.matches(&data));
        assert!(by_owner.matches(&data));
        assert!(by_nonce.matches(&data));

        // Decoding the same offsets recovers the original values.
        assert_eq!(data[1..33], owner.to_bytes());
        assert_eq!(u64::from_le_bytes(data[33..41].try_into().unwrap()), nonce);
    }

    #[test]
    fn memcmp_outside_the_buffer_does_not_match() {
        let filter = AccountFilter::Memcmp {
            offset: 8,
            bytes: vec![1, 2],
        };
        assert!(!filter.matches(&[0u8; 9]));
        assert!(filter.matches(&[0, 0, 0, 0, 0, 0, 0, 0, 1, 2]));
    }

    #[test]
    fn data_size_is_exact() {
        let filter = AccountFilter::DataSize(4);
        assert!(filter.matches(&[0u8; 4]));
        assert!(!filter.matches(&[0u8; 5]));
    }

    #[test]
    fn slice_clamps_to_the_buffer() {
        let slice = DataSlice {
            offset: 2,
            length: 4,
        };
        assert_eq!(slice.apply(&[1, 2, 3, 4]), vec![3, 4]);
        assert_eq!(slice.apply(&[1, 2, 3, 4, 5, 6, 7]), vec![3, 4, 5, 6]);
        assert!(DataSlice {
            offset: 9,
            length: 1
        }
        .apply(&[1, 2])
        .is_empty());
    }
}
