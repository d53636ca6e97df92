//! Built-in operations over the system program: funding, transfers, and
//! account lookups. Doubles as the reference vertical for writing plugins.

use std::time::Duration;

use futures::future::BoxFuture;
use solana_address::Address;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_system_interface::instruction::transfer;
use strum_macros::{
    Display,
    FromRepr,
};

use crate::{
    accounts::{
        KeyedAccount,
        MaybeAccount,
    },
    client::{
        Sextant,
        SextantPlugin,
    },
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
    operation::{
        Operation,
        OperationHandler,
    },
    programs::Program,
    scope::CancelScope,
    transaction::{
        ConfirmOptions,
        InstructionRecord,
        TransactionBuilder,
        TransactionOutcome,
        TransactionSigner,
    },
};

pub const AIRDROP_SOL: &str = "airdrop_sol";
pub const TRANSFER_SOL: &str = "transfer_sol";
pub const FIND_ACCOUNT_BY_ADDRESS: &str = "find_account_by_address";
pub const FIND_ACCOUNTS_BY_ADDRESS_LIST: &str = "find_accounts_by_address_list";

pub const DEFAULT_FUND_AMOUNT: u64 = 10_000_000_000;

const MAX_TRIES: u8 = 20;
const AIRDROP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The system program's custom error codes.
#[derive(Clone, Copy, Debug, Display, FromRepr)]
#[repr(u32)]
pub enum SystemProgramError {
    AccountAlreadyInUse,
    ResultWithNegativeLamports,
    InvalidProgramId,
    InvalidAccountDataLength,
    MaxSeedLengthExceeded,
    AddressWithSeedMismatch,
    NonceNoRecentBlockhashes,
    NonceBlockhashNotExpired,
    NonceUnexpectedBlockhashValue,
}

#[derive(Clone)]
pub struct AirdropSolInput {
    pub recipient: Address,
    pub lamports: u64,
}

pub fn airdrop_sol(recipient: Address, lamports: u64) -> Operation<AirdropSolInput, Signature> {
    Operation::new(AIRDROP_SOL, AirdropSolInput { recipient, lamports })
}

#[derive(Clone)]
pub struct TransferSolInput {
    pub from: TransactionSigner,
    pub to: Address,
    pub lamports: u64,
}

pub fn transfer_sol(
    from: impl Into<TransactionSigner>,
    to: Address,
    lamports: u64,
) -> Operation<TransferSolInput, TransactionOutcome> {
    Operation::new(
        TRANSFER_SOL,
        TransferSolInput {
            from: from.into(),
            to,
            lamports,
        },
    )
}

#[derive(Clone)]
pub struct FindAccountByAddressInput {
    pub address: Address,
    pub commitment: Option<CommitmentConfig>,
}

pub fn find_account_by_address(address: Address) -> Operation<FindAccountByAddressInput, KeyedAccount> {
    Operation::new(
        FIND_ACCOUNT_BY_ADDRESS,
        FindAccountByAddressInput {
            address,
            commitment: None,
        },
    )
}

#[derive(Clone)]
pub struct FindAccountsByAddressListInput {
    pub addresses: Vec<Address>,
    pub chunk_size: Option<usize>,
}

pub fn find_accounts_by_address_list(
    addresses: Vec<Address>,
) -> Operation<FindAccountsByAddressListInput, Vec<MaybeAccount>> {
    Operation::new(
        FIND_ACCOUNTS_BY_ADDRESS_LIST,
        FindAccountsByAddressListInput {
            addresses,
            chunk_size: None,
        },
    )
}

pub struct AirdropSolHandler;

impl<C: Connection> OperationHandler<C, AirdropSolInput, Signature> for AirdropSolHandler {
    fn handle<'a>(
        &'a self,
        input: AirdropSolInput,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<Signature>> {
        Box::pin(async move {
            let signature = client
                .connection()
                .request_airdrop(&input.recipient, input.lamports)
                .await?;
            scope.bail_if_canceled()?;

            // Wait for airdrop confirmation.
            let mut tries = 0;
            while !client.connection().confirm_transaction(&signature).await?
                && tries < MAX_TRIES
            {
                scope.bail_if_canceled()?;
                tokio::time::sleep(AIRDROP_POLL_INTERVAL).await;
                tries += 1;
            }

            if tries == MAX_TRIES {
                return Err(ClientError::Unconfirmed { signature, tries });
            }

            Ok(signature)
        })
    }
}

pub struct TransferSolHandler;

impl<C: Connection> OperationHandler<C, TransferSolInput, TransactionOutcome> for TransferSolHandler {
    fn handle<'a>(
        &'a self,
        input: TransferSolInput,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<TransactionOutcome>> {
        Box::pin(async move {
            let from_address = input.from.address();
            let record = InstructionRecord::new(transfer(&from_address, &input.to, input.lamports))
                .with_key(TRANSFER_SOL)
                .with_signer(input.from.clone());

            TransactionBuilder::new()
                .add(record)
                .set_fee_payer(input.from)
                .send_and_confirm(client, scope, ConfirmOptions::default())
                .await
        })
    }
}

pub struct FindAccountByAddressHandler;

impl<C: Connection> OperationHandler<C, FindAccountByAddressInput, KeyedAccount>
    for FindAccountByAddressHandler
{
    fn handle<'a>(
        &'a self,
        input: FindAccountByAddressInput,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<KeyedAccount>> {
        Box::pin(async move {
            let commitment = input
                .commitment
                .unwrap_or_else(|| client.connection().commitment());
            let account = client
                .connection()
                .get_account(&input.address, commitment)
                .await?;
            scope.bail_if_canceled()?;

            account
                .map(|account| KeyedAccount {
                    address: input.address,
                    account,
                })
                .ok_or(ClientError::AccountNotFound {
                    address: input.address,
                })
        })
    }
}

pub struct FindAccountsByAddressListHandler;

impl<C: Connection> OperationHandler<C, FindAccountsByAddressListInput, Vec<MaybeAccount>>
    for FindAccountsByAddressListHandler
{
    fn handle<'a>(
        &'a self,
        input: FindAccountsByAddressListInput,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<Vec<MaybeAccount>>> {
        Box::pin(async move {
            let mut fetcher = client.gma(input.addresses);
            if let Some(chunk_size) = input.chunk_size {
                fetcher = fetcher.with_chunk_size(chunk_size);
            }
            let slots = fetcher.get().await?;
            scope.bail_if_canceled()?;
            Ok(slots)
        })
    }
}

/// Installs the system-program vertical: its four operations plus the
/// program registration that labels its custom error codes.
pub struct SystemPlugin;

impl<C: Connection + 'static> SextantPlugin<C> for SystemPlugin {
    fn install(self, client: &mut Sextant<C>) {
        client.programs_mut().register(
            Program::new("system", solana_system_interface::program::ID).with_error_resolver(
                |code| SystemProgramError::from_repr(code).map(|error| error.to_string()),
            ),
        );

        let operations = client.operations_mut();
        operations.register(AIRDROP_SOL, AirdropSolHandler);
        operations.register(TRANSFER_SOL, TransferSolHandler);
        operations.register(FIND_ACCOUNT_BY_ADDRESS, FindAccountByAddressHandler);
        operations.register(FIND_ACCOUNTS_BY_ADDRESS_LIST, FindAccountsByAddressListHandler);
    }
}
