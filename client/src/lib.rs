//! Client-side SDK for Solana-style ledger programs.
//!
//! Builds, signs, and submits transactions; scans and bulk-fetches the
//! resulting on-chain accounts. Operations dispatch through a pluggable
//! handler registry owned by a [`Sextant`] client, with cooperative
//! cancellation threaded through every invocation.

pub mod accounts;
pub mod client;
pub mod connection;
pub mod error;
pub mod gma;
pub mod gpa;
pub mod logs;
pub mod memory;
pub mod operation;
pub mod programs;
pub mod scope;
pub mod system;
pub mod transaction;

pub use client::{
    Sextant,
    SextantPlugin,
};
pub use error::{
    ClientError,
    ClientResult,
};
pub use logs::{
    LogEntry,
    LogHue,
};
