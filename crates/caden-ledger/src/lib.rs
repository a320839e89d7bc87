//! Remote ledger boundary for the Caden sync client.
//!
//! Everything that knows about the wire lives here: JSON-RPC transport,
//! account layouts, decode-with-fallback, program-derived addresses and
//! instruction builders. Downstream crates only see decoded domain types
//! through the [`LedgerReader`] / [`LedgerWriter`] seams.

pub mod accounts;
pub mod client;
pub mod decode;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod mock;
pub mod pda;
pub mod signer;

pub use client::RpcClient;
pub use error::{LedgerError, LedgerResult};
pub use instruction::liquidate_position;
pub use ledger::{
    Confirmation, DynReader, DynWriter, LedgerReader, LedgerWriter, RpcLedger,
    DEFAULT_CONFIRM_TIMEOUT,
};
pub use mock::{MockLedger, MockSigner};
pub use pda::{associated_token_address, ProgramAddresses};
pub use signer::{BoxFuture, DynSigner, SignedTransaction, TransactionSigner, UnsignedTransaction};
