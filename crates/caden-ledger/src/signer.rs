//! Signing capability injected by the wallet layer.
//!
//! The sync core never sees key material: it hands a fully assembled
//! message to the signer and receives wire bytes back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::error::LedgerResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transaction awaiting a signature.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub instructions: Vec<Instruction>,
    /// Fee payer; always the signer's identity.
    pub payer: Pubkey,
    pub recent_blockhash: Hash,
}

/// Signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Base58 transaction signature, used to poll confirmation.
    pub signature: String,
    /// Serialized transaction bytes.
    pub wire: Vec<u8>,
}

pub trait TransactionSigner: Send + Sync {
    fn identity(&self) -> Pubkey;

    fn sign(&self, tx: UnsignedTransaction) -> BoxFuture<'_, LedgerResult<SignedTransaction>>;
}

/// Arc wrapper for signer trait objects.
pub type DynSigner = Arc<dyn TransactionSigner>;
