//! Program-derived addresses.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::{pubkey, system_program};

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
pub const SYSTEM_PROGRAM_ID: Pubkey = system_program::ID;

/// Fixed addresses of one program deployment, derived once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAddresses {
    pub program_id: Pubkey,
    pub market: Pubkey,
    pub oracle: Pubkey,
    pub multi_oracle: Pubkey,
    pub usdc_vault: Pubkey,
    pub cfd_mint: Pubkey,
}

impl ProgramAddresses {
    pub fn derive(program_id: Pubkey) -> Self {
        let find = |seed: &[u8]| Pubkey::find_program_address(&[seed], &program_id).0;
        Self {
            program_id,
            market: find(b"market"),
            oracle: find(b"oracle"),
            multi_oracle: find(b"multi_oracle"),
            usdc_vault: find(b"usdc_vault"),
            cfd_mint: find(b"mint"),
        }
    }

    /// Leveraged position of `owner`.
    pub fn position(&self, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"position", owner.as_ref()], &self.program_id).0
    }
}

/// Associated token account of `wallet` for `mint`.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}
