//! End-to-end dispatch through the system-program plugin over the in-memory
//! connection.

use std::time::Duration;

use futures::future::BoxFuture;
use sextant_client::{
    accounts::KeyedAccount,
    error::{
        ClientError,
        ClientResult,
    },
    memory::MemoryConnection,
    operation::{
        ExecuteOptions,
        OperationHandler,
    },
    scope::{
        CancelHandle,
        CancelScope,
        CancellationReason,
    },
    system::{
        airdrop_sol,
        find_account_by_address,
        find_accounts_by_address_list,
        transfer_sol,
        FindAccountByAddressInput,
        SystemPlugin,
        FIND_ACCOUNT_BY_ADDRESS,
    },
    Sextant,
    SextantPlugin,
};
use solana_account::Account;
use solana_address::Address;
use solana_sdk::signature::{
    Keypair,
    Signature,
    Signer,
};

const SYSTEM_PROGRAM_ID: Address = solana_system_interface::program::ID;

fn new_client() -> Sextant<MemoryConnection> {
    let mut client = Sextant::new(MemoryConnection::new());
    client.install(SystemPlugin);
    client
}

#[tokio::test]
async fn transfer_sol_builds_signs_and_submits() {
    let client = new_client();
    let payer = Keypair::new();
    let payer_address = payer.pubkey();
    let recipient = Address::new_unique();

    let outcome = client
        .execute(
            transfer_sol(payer, recipient, 500),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    assert!(outcome.confirmed);
    assert_ne!(outcome.signature, Signature::default());

    let sent = client.connection().sent_transactions();
    assert_eq!(sent.len(), 1);
    let transaction = &sent[0];
    assert_eq!(transaction.message.instructions.len(), 1);
    assert_eq!(transaction.message.account_keys[0], payer_address);
    assert!(transaction.message.account_keys.contains(&recipient));
    // The payer both pays fees and signs the transfer.
    assert_ne!(transaction.signatures[0], Signature::default());
}

#[tokio::test]
async fn find_account_by_address_distinguishes_missing_from_found() {
    let client = new_client();
    let known = Address::new_unique();
    client
        .connection()
        .set_account(known, Account::new(1_000, 0, &SYSTEM_PROGRAM_ID));

    let found = client
        .execute(find_account_by_address(known), ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(found.address, known);
    assert_eq!(found.account.lamports, 1_000);

    let unknown = Address::new_unique();
    let missing = client
        .execute(find_account_by_address(unknown), ExecuteOptions::default())
        .await;
    assert!(
        matches!(missing, Err(ClientError::AccountNotFound { address }) if address == unknown)
    );
}

#[tokio::test]
async fn find_accounts_by_address_list_tags_existence_in_order() {
    let client = new_client();
    let x = Address::new_unique();
    let y = Address::new_unique();
    let z = Address::new_unique();
    client
        .connection()
        .set_account(y, Account::new(5, 0, &SYSTEM_PROGRAM_ID));

    let slots = client
        .execute(
            find_accounts_by_address_list(vec![x, y, z]),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(slots.len(), 3);
    assert!(!slots[0].exists());
    assert_eq!(slots[0].address(), &x);
    assert!(slots[1].exists());
    assert_eq!(slots[1].account().unwrap().lamports, 5);
    assert!(!slots[2].exists());
    assert_eq!(slots[2].address(), &z);
}

#[tokio::test]
async fn airdrop_credits_after_confirmation_polls() {
    let client = new_client();
    let recipient = Address::new_unique();
    client.connection().require_confirm_polls(2);

    let signature = client
        .execute(airdrop_sol(recipient, 1_000_000), ExecuteOptions::default())
        .await
        .unwrap();
    assert_ne!(signature, Signature::default());
    assert_eq!(client.connection().account(&recipient).unwrap().lamports, 1_000_000);
}

#[tokio::test]
async fn airdrop_confirm_loop_observes_cancellation() {
    let client = new_client();
    let recipient = Address::new_unique();
    // More polls than the caller is willing to wait for.
    client.connection().require_confirm_polls(u8::MAX);

    let handle = CancelHandle::new();
    let options = ExecuteOptions {
        signal: Some(handle.clone()),
        timeout: None,
    };

    let (result, _) = tokio::join!(
        client.execute(airdrop_sol(recipient, 1), options),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel("gave up");
        }
    );

    match result {
        Err(ClientError::Canceled(reason)) => {
            assert_eq!(reason, CancellationReason::Canceled("gave up".into()));
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[tokio::test]
async fn the_system_program_registration_labels_error_codes() {
    let client = new_client();
    let program = client.programs().get_by_name("system").unwrap();
    assert_eq!(program.address, SYSTEM_PROGRAM_ID);
    assert_eq!(
        program.resolve_error_code(0).as_deref(),
        Some("AccountAlreadyInUse")
    );
    assert!(program.resolve_error_code(999).is_none());
}

/// A plugin that stubs out one system operation, as a host would when
/// mocking a vertical.
struct StubFindAccount;

struct StubFindAccountHandler;

impl OperationHandler<MemoryConnection, FindAccountByAddressInput, KeyedAccount>
    for StubFindAccountHandler
{
    fn handle<'a>(
        &'a self,
        input: FindAccountByAddressInput,
        _client: &'a Sextant<MemoryConnection>,
        _scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<KeyedAccount>> {
        Box::pin(async move {
            Ok(KeyedAccount {
                address: input.address,
                account: Account::new(42, 0, &SYSTEM_PROGRAM_ID),
            })
        })
    }
}

impl SextantPlugin<MemoryConnection> for StubFindAccount {
    fn install(self, client: &mut Sextant<MemoryConnection>) {
        client
            .operations_mut()
            .register(FIND_ACCOUNT_BY_ADDRESS, StubFindAccountHandler);
    }
}

#[tokio::test]
async fn a_later_plugin_overrides_an_installed_operation() {
    let mut client = new_client();
    client.install(StubFindAccount);

    // The stub answers even for an address the connection knows nothing of.
    let found = client
        .execute(
            find_account_by_address(Address::new_unique()),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.account.lamports, 42);
}
