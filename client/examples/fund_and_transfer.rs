//! Funds a fresh payer on a local validator, transfers a slice of it, and
//! reads the recipient back.

use anyhow::Context;
use sextant_client::{
    connection::{
        ConnectionConfig,
        RpcConnection,
    },
    operation::ExecuteOptions,
    system::{
        airdrop_sol,
        find_account_by_address,
        transfer_sol,
        SystemPlugin,
        DEFAULT_FUND_AMOUNT,
    },
    LogEntry,
    LogHue,
    Sextant,
};
use solana_sdk::signature::{
    Keypair,
    Signer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let connection = RpcConnection::new(
        None,
        Some(ConnectionConfig {
            debug_logs: true,
            ..Default::default()
        }),
    );
    let mut client = Sextant::new(connection);
    client.install(SystemPlugin);

    let payer = Keypair::new();
    let payer_address = payer.pubkey();
    client
        .execute(
            airdrop_sol(payer_address, DEFAULT_FUND_AMOUNT),
            ExecuteOptions::default(),
        )
        .await
        .context("Failed to fund the payer")?;
    LogEntry::new("Funded payer", payer_address).log();

    let recipient = Keypair::new().pubkey();
    let outcome = client
        .execute(
            transfer_sol(payer, recipient, 1_000_000),
            ExecuteOptions::default(),
        )
        .await
        .context("Failed to transfer")?;
    LogEntry::new("Transfer signature", outcome.signature).log();
    LogEntry::new("Confirmed", outcome.confirmed)
        .hue(LogHue::Info)
        .log();

    let account = client
        .execute(find_account_by_address(recipient), ExecuteOptions::default())
        .await
        .context("Recipient should exist after the transfer")?;
    LogEntry::new("Recipient balance", account.account.lamports).log();

    Ok(())
}
