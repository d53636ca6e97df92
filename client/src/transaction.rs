//! Ordered accumulation of instructions and their signers, and submission of
//! the assembled transaction.

use std::{
    collections::HashSet,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use itertools::Itertools;
use solana_address::Address;
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_instruction::Instruction;
use solana_sdk::{
    hash::Hash,
    message::Message,
    signature::{
        Keypair,
        Signature,
        Signer,
    },
    transaction::Transaction,
};

use crate::{
    client::Sextant,
    connection::Connection,
    error::{
        ClientError,
        ClientResult,
    },
    scope::CancelScope,
};

/// An identity that can only produce signatures on demand, never expose
/// secret material. Wallet adapters and signing services implement this.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn try_sign(&self, message: &[u8]) -> ClientResult<Signature>;
}

/// Either a full keypair or a remote identity. The two are not
/// interchangeable at signing time, but compare equal whenever their
/// addresses do.
#[derive(Clone)]
pub enum TransactionSigner {
    Keypair(Arc<Keypair>),
    Remote(Arc<dyn RemoteSigner>),
}

impl TransactionSigner {
    pub fn address(&self) -> Address {
        match self {
            TransactionSigner::Keypair(keypair) => keypair.pubkey(),
            TransactionSigner::Remote(remote) => remote.address(),
        }
    }
}

impl PartialEq for TransactionSigner {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl From<Keypair> for TransactionSigner {
    fn from(keypair: Keypair) -> Self {
        TransactionSigner::Keypair(Arc::new(keypair))
    }
}

impl From<Arc<Keypair>> for TransactionSigner {
    fn from(keypair: Arc<Keypair>) -> Self {
        TransactionSigner::Keypair(keypair)
    }
}

impl From<Arc<dyn RemoteSigner>> for TransactionSigner {
    fn from(remote: Arc<dyn RemoteSigner>) -> Self {
        TransactionSigner::Remote(remote)
    }
}

/// One instruction together with the signers it requires.
pub struct InstructionRecord {
    pub key: Option<&'static str>,
    pub instruction: Instruction,
    pub signers: Vec<TransactionSigner>,
}

impl InstructionRecord {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            key: None,
            instruction,
            signers: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_signer(mut self, signer: impl Into<TransactionSigner>) -> Self {
        self.signers.push(signer.into());
        self
    }
}

impl From<Instruction> for InstructionRecord {
    fn from(instruction: Instruction) -> Self {
        InstructionRecord::new(instruction)
    }
}

/// Outcome of a send-and-confirm round trip. `confirmed` is exactly what the
/// connection reported; an unconfirmed-but-accepted transaction is not an
/// error here.
#[derive(Debug)]
pub struct TransactionOutcome {
    pub signature: Signature,
    pub confirmed: bool,
}

#[derive(Clone, Copy)]
pub struct ConfirmOptions {
    pub max_tries: u8,
    pub poll_interval: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        ConfirmOptions {
            max_tries: 20,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Accumulates instruction records in execution order.
///
/// Instructions execute sequentially within one transaction and later ones
/// may depend on state written by earlier ones, so append order is
/// significant and never implicitly reordered. Builder calls consume and
/// return the builder; no aliasing is possible.
///
/// `Ctx` carries intermediate values a handler derives while assembling the
/// transaction (a freshly generated address, say) so the eventual operation
/// output can be built without re-deriving them.
pub struct TransactionBuilder<Ctx = ()> {
    records: Vec<InstructionRecord>,
    fee_payer: Option<TransactionSigner>,
    context: Option<Ctx>,
}

impl TransactionBuilder<()> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            fee_payer: None,
            context: None,
        }
    }
}

impl Default for TransactionBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> TransactionBuilder<Ctx> {
    pub fn add(mut self, record: impl Into<InstructionRecord>) -> Self {
        self.records.push(record.into());
        self
    }

    /// Inserts ahead of everything accumulated so far.
    pub fn prepend(mut self, record: impl Into<InstructionRecord>) -> Self {
        self.records.insert(0, record.into());
        self
    }

    /// Designates the fee payer. This does not add it to the signer set; a
    /// fee payer that must also sign belongs among some record's signers.
    pub fn set_fee_payer(mut self, signer: impl Into<TransactionSigner>) -> Self {
        self.fee_payer = Some(signer.into());
        self
    }

    pub fn fee_payer(&self) -> Option<&TransactionSigner> {
        self.fee_payer.as_ref()
    }

    /// Prepends compute-budget instructions ahead of the accumulated records.
    pub fn with_compute_budget(self, compute_unit_limit: u32) -> Self {
        self.prepend(ComputeBudgetInstruction::set_compute_unit_price(1))
            .prepend(ComputeBudgetInstruction::set_compute_unit_limit(
                compute_unit_limit,
            ))
    }

    /// Replaces the carried context, possibly changing its type.
    pub fn with_context<T>(self, context: T) -> TransactionBuilder<T> {
        TransactionBuilder {
            records: self.records,
            fee_payer: self.fee_payer,
            context: Some(context),
        }
    }

    pub fn context(&self) -> Option<&Ctx> {
        self.context.as_ref()
    }

    pub fn into_context(self) -> Option<Ctx> {
        self.context
    }

    pub fn records(&self) -> &[InstructionRecord] {
        &self.records
    }

    /// An empty builder assembles a valid no-op transaction; whether the
    /// transport accepts one is the transport's business.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The ordered instruction payloads, exactly as accumulated.
    pub fn instructions(&self) -> Vec<Instruction> {
        self.records
            .iter()
            .map(|record| record.instruction.clone())
            .collect_vec()
    }

    /// Every record's signers flattened into one list, deduplicated by
    /// address. The first occurrence in accumulation order wins regardless
    /// of signer kind, so the earliest record determines which concrete
    /// signer is used when a keypair and a remote identity share an address.
    pub fn signers(&self) -> Vec<TransactionSigner> {
        let mut seen = HashSet::new();
        let mut signers = Vec::new();
        for record in &self.records {
            for signer in &record.signers {
                if seen.insert(signer.address()) {
                    signers.push(signer.clone());
                }
            }
        }
        signers
    }

    /// Assembles the message and collects every required signature. Keypairs
    /// partial-sign; remote signers sign the message bytes and are slotted
    /// in by their signer position.
    pub async fn sign(&self, blockhash: Hash) -> ClientResult<Transaction> {
        let fee_payer = self.fee_payer.as_ref().ok_or(ClientError::MissingFeePayer)?;
        let message = Message::new(&self.instructions(), Some(&fee_payer.address()));
        let mut transaction = Transaction::new_unsigned(message);
        transaction.message.recent_blockhash = blockhash;

        let signers = self.signers();

        let keypairs = signers
            .iter()
            .filter_map(|signer| match signer {
                TransactionSigner::Keypair(keypair) => Some(keypair.as_ref()),
                TransactionSigner::Remote(_) => None,
            })
            .collect_vec();
        if !keypairs.is_empty() {
            transaction.try_partial_sign(&keypairs, blockhash)?;
        }

        let message_data = transaction.message_data();
        for signer in &signers {
            let TransactionSigner::Remote(remote) = signer else {
                continue;
            };
            let address = remote.address();
            let position = transaction
                .get_signing_keypair_positions(&[address])
                .ok()
                .and_then(|positions| positions.first().copied().flatten())
                .ok_or(ClientError::UnexpectedSigner { address })?;
            transaction.signatures[position] = remote.try_sign(&message_data).await?;
        }

        Ok(transaction)
    }

    /// Signs with the accumulated signer set, submits, and polls for
    /// confirmation, checkpointing the scope between polls.
    pub async fn send_and_confirm<C: Connection>(
        &self,
        client: &Sextant<C>,
        scope: &CancelScope,
        options: ConfirmOptions,
    ) -> ClientResult<TransactionOutcome> {
        let blockhash = client.connection().get_latest_blockhash().await?;
        scope.bail_if_canceled()?;

        let transaction = self.sign(blockhash).await?;
        let signature = match client.connection().send_transaction(&transaction).await {
            Ok(signature) => signature,
            Err(error) => return Err(client.resolve_program_error(error)),
        };

        let mut confirmed = client.connection().confirm_transaction(&signature).await?;
        let mut tries = 0;
        while !confirmed && tries < options.max_tries {
            scope.bail_if_canceled()?;
            tokio::time::sleep(options.poll_interval).await;
            confirmed = client.connection().confirm_transaction(&signature).await?;
            tries += 1;
        }

        Ok(TransactionOutcome {
            signature,
            confirmed,
        })
    }
}
