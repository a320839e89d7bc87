//! Builds and submits liquidation instructions.

use caden_core::LeveragedPosition;
use caden_ledger::{liquidate_position, Confirmation, DynSigner, DynWriter, ProgramAddresses};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::error::LiquidatorResult;

/// Write path of the monitor. Absent in watch-only sessions.
#[derive(Clone)]
pub struct LiquidationExecutor {
    writer: DynWriter,
    signer: DynSigner,
    addresses: ProgramAddresses,
    usdc_mint: Pubkey,
}

impl LiquidationExecutor {
    pub fn new(
        writer: DynWriter,
        signer: DynSigner,
        addresses: ProgramAddresses,
        usdc_mint: Pubkey,
    ) -> Self {
        Self {
            writer,
            signer,
            addresses,
            usdc_mint,
        }
    }

    /// The liquidator wallet.
    pub fn liquidator(&self) -> Pubkey {
        self.signer.identity()
    }

    pub fn instruction(&self, position: &LeveragedPosition) -> Instruction {
        liquidate_position(
            &self.addresses,
            position.address,
            &position.owner,
            &self.liquidator(),
            &self.usdc_mint,
        )
    }

    /// Sign, send and wait for confirmation.
    pub async fn execute(&self, position: &LeveragedPosition) -> LiquidatorResult<Confirmation> {
        let ix = self.instruction(position);
        let confirmation = self
            .writer
            .submit(vec![ix], self.signer.clone())
            .await?;
        Ok(confirmation)
    }
}
