//! Scans the token program for one owner's token accounts, largest balance
//! first, using only byte-offset predicates over the fixed account layout.

use std::str::FromStr;

use anyhow::Context;
use sextant_client::{
    connection::RpcConnection,
    LogEntry,
    LogHue,
    Sextant,
};
use solana_address::Address;

const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL token accounts are a fixed 165 bytes: mint at 0, owner at 32.
const TOKEN_ACCOUNT_SIZE: u64 = 165;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let owner = std::env::args()
        .nth(1)
        .context("Usage: scan_token_accounts <owner-address>")?;
    let owner = Address::from_str(&owner).context("Not a valid owner address")?;
    let token_program = Address::from_str(TOKEN_PROGRAM)?;

    let client = Sextant::new(RpcConnection::default());

    let holdings = client
        .gpa(token_program)
        .data_size(TOKEN_ACCOUNT_SIZE)
        .memcmp(32, &owner)
        .sort_using(|a, b| b.account.lamports.cmp(&a.account.lamports))
        .get()
        .await?;
    LogEntry::new("Token accounts", holdings.len())
        .hue(LogHue::Info)
        .log();
    for keyed in &holdings {
        LogEntry::new(keyed.address, format!("{} lamports", keyed.account.lamports)).log();
    }

    // The same scan projected down to the 32-byte mint field.
    let mints = client
        .gpa(token_program)
        .data_size(TOKEN_ACCOUNT_SIZE)
        .memcmp(32, &owner)
        .slice(0, 32)
        .get_data_as_addresses()
        .await?;
    for mint in &mints {
        LogEntry::new("Mint", mint).log();
    }

    Ok(())
}
