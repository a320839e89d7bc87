//! Keypair-file transaction signer.

use caden_ledger::{
    BoxFuture, LedgerError, LedgerResult, SignedTransaction, TransactionSigner,
    UnsignedTransaction,
};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use solana_sdk::transaction::Transaction;

use crate::error::{AppError, AppResult};

/// Signs with a local keypair. The keypair never leaves this type.
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a JSON keypair file (the CLI wallet format).
    pub fn from_file(path: &str) -> AppResult<Self> {
        let keypair = read_keypair_file(path)
            .map_err(|e| AppError::Config(format!("Failed to read keypair {path}: {e}")))?;
        Ok(Self::new(keypair))
    }

    fn sign_now(&self, tx: UnsignedTransaction) -> LedgerResult<SignedTransaction> {
        let mut transaction = Transaction::new_with_payer(&tx.instructions, Some(&tx.payer));
        transaction
            .try_sign(&[&self.keypair], tx.recent_blockhash)
            .map_err(|e| LedgerError::Signer(e.to_string()))?;

        let signature = transaction
            .signatures
            .first()
            .map(ToString::to_string)
            .ok_or_else(|| LedgerError::Signer("Transaction has no signature".to_string()))?;
        let wire =
            bincode::serialize(&transaction).map_err(|e| LedgerError::Signer(e.to_string()))?;

        Ok(SignedTransaction { signature, wire })
    }
}

impl TransactionSigner for KeypairSigner {
    fn identity(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign(&self, tx: UnsignedTransaction) -> BoxFuture<'_, LedgerResult<SignedTransaction>> {
        Box::pin(async move { self.sign_now(tx) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::{AccountMeta, Instruction};

    fn instruction(signer: &Pubkey) -> Instruction {
        Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![AccountMeta::new(*signer, true)],
            data: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_signed_wire_verifies() {
        let signer = KeypairSigner::new(Keypair::new());
        let identity = signer.identity();

        let signed = signer
            .sign(UnsignedTransaction {
                instructions: vec![instruction(&identity)],
                payer: identity,
                recent_blockhash: Hash::new_unique(),
            })
            .await
            .unwrap();

        let decoded: Transaction = bincode::deserialize(&signed.wire).unwrap();
        assert!(decoded.verify().is_ok());
        assert_eq!(decoded.signatures[0].to_string(), signed.signature);
        assert_eq!(decoded.message.account_keys[0], identity);
    }

    #[tokio::test]
    async fn test_foreign_payer_is_signer_error() {
        let signer = KeypairSigner::new(Keypair::new());
        let stranger = Pubkey::new_unique();

        let err = signer
            .sign(UnsignedTransaction {
                instructions: vec![instruction(&stranger)],
                payer: stranger,
                recent_blockhash: Hash::new_unique(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Signer(_)));
    }

    #[test]
    fn test_missing_keypair_file() {
        let err = KeypairSigner::from_file("/nonexistent/id.json").err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}
