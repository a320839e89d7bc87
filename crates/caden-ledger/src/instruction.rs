//! Instruction builders for state-changing program calls.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::decode::discriminator;
use crate::pda::{
    associated_token_address, ProgramAddresses, ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};

/// `liquidate_position` for the position at `position` owned by `owner`.
///
/// Account order matches the program's instruction context; the
/// instruction carries no arguments beyond its discriminator.
pub fn liquidate_position(
    addrs: &ProgramAddresses,
    position: Pubkey,
    owner: &Pubkey,
    liquidator: &Pubkey,
    usdc_mint: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(position, false),
        AccountMeta::new(addrs.market, false),
        AccountMeta::new(addrs.usdc_vault, false),
        AccountMeta::new(addrs.cfd_mint, false),
        AccountMeta::new(associated_token_address(owner, &addrs.cfd_mint), false),
        AccountMeta::new(associated_token_address(owner, usdc_mint), false),
        AccountMeta::new(associated_token_address(liquidator, usdc_mint), false),
        AccountMeta::new_readonly(*usdc_mint, false),
        AccountMeta::new(*liquidator, true),
        AccountMeta::new_readonly(addrs.oracle, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
    ];

    Instruction {
        program_id: addrs.program_id,
        accounts,
        data: discriminator("global", "liquidate_position").to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquidate_position_layout() {
        let addrs = ProgramAddresses::derive(Pubkey::new_unique());
        let position = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let liquidator = Pubkey::new_unique();
        let usdc = Pubkey::new_unique();

        let ix = liquidate_position(&addrs, position, &owner, &liquidator, &usdc);
        assert_eq!(ix.program_id, addrs.program_id);
        assert_eq!(ix.accounts.len(), 13);
        assert_eq!(ix.accounts[0].pubkey, position);
        assert!(ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[8].pubkey, liquidator);
        assert!(ix.accounts[8].is_signer);
        assert_eq!(ix.accounts.iter().filter(|m| m.is_signer).count(), 1);
        assert_eq!(ix.data, discriminator("global", "liquidate_position").to_vec());
    }
}
