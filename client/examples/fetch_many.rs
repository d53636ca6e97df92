//! Bulk-fetches every address given on the command line, tagging each slot
//! with whether an account exists there.

use std::{
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use sextant_client::{
    accounts::MaybeAccount,
    connection::RpcConnection,
    operation::ExecuteOptions,
    system::{
        find_accounts_by_address_list,
        SystemPlugin,
    },
    LogEntry,
    LogHue,
    Sextant,
};
use solana_address::Address;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addresses = std::env::args()
        .skip(1)
        .map(|arg| Address::from_str(&arg))
        .collect::<Result<Vec<_>, _>>()
        .context("Usage: fetch_many <address>...")?;

    let mut client = Sextant::new(RpcConnection::default());
    client.install(SystemPlugin);

    let slots = client
        .execute(
            find_accounts_by_address_list(addresses),
            ExecuteOptions {
                signal: None,
                timeout: Some(Duration::from_secs(10)),
            },
        )
        .await
        .context("Bulk fetch failed")?;

    for slot in &slots {
        match slot {
            MaybeAccount::Found { address, account } => {
                LogEntry::new(address, format!("{} lamports", account.lamports)).log();
            }
            MaybeAccount::Missing(address) => {
                LogEntry::new(address, "no account").hue(LogHue::Warning).log();
            }
        }
    }

    Ok(())
}
