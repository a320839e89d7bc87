//! Reader/writer seams over the remote ledger and their RPC implementation.

use std::sync::Arc;
use std::time::Duration;

use caden_core::{LeveragedPosition, MarketQuote, PositionHolding, Price};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::accounts::{
    RawBet, RawMarket, RawMultiAssetOracle, RawOracle, RawPosition, BET_ACCOUNT, POSITION_ACCOUNT,
};
use crate::client::{memcmp_filter, RpcClient};
use crate::decode::{account_discriminator, DISCRIMINATOR_LEN};
use crate::error::{LedgerError, LedgerResult};
use crate::pda::ProgramAddresses;
use crate::signer::{BoxFuture, DynSigner, UnsignedTransaction};

/// Default time to wait for a submitted transaction to confirm.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Confirmed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: String,
    pub slot: u64,
}

/// Read side of the remote ledger. Shared read-only by every poller.
pub trait LedgerReader: Send + Sync {
    /// Leveraged position of `owner`; `None` if absent or undecodable.
    fn position(&self, owner: Pubkey) -> BoxFuture<'_, LedgerResult<Option<LeveragedPosition>>>;

    /// Composite market quote.
    fn market(&self) -> BoxFuture<'_, LedgerResult<MarketQuote>>;

    /// Settlement instruments of `owner`, sorted by id.
    fn holdings(&self, owner: Pubkey) -> BoxFuture<'_, LedgerResult<Vec<PositionHolding>>>;

    /// Every leveraged position of the program, liquidated ones included.
    fn all_positions(&self) -> BoxFuture<'_, LedgerResult<Vec<LeveragedPosition>>>;
}

/// Write side of the remote ledger.
pub trait LedgerWriter: Send + Sync {
    /// Sign `instructions` with `signer`, submit, and wait for confirmation.
    fn submit(
        &self,
        instructions: Vec<Instruction>,
        signer: DynSigner,
    ) -> BoxFuture<'_, LedgerResult<Confirmation>>;
}

pub type DynReader = Arc<dyn LedgerReader>;
pub type DynWriter = Arc<dyn LedgerWriter>;

/// Decoded value, or `None` with a warning when the bytes are malformed.
fn decode_or_none<T>(
    kind: &str,
    address: &Pubkey,
    data: Option<&[u8]>,
    decode: impl FnOnce(&[u8]) -> LedgerResult<T>,
) -> Option<T> {
    match decode(data?) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(account = %address, kind, error = %e, "Malformed account, treating as no data");
            None
        }
    }
}

/// [`LedgerReader`] and [`LedgerWriter`] over JSON-RPC.
pub struct RpcLedger {
    rpc: RpcClient,
    addrs: ProgramAddresses,
    confirm_timeout: Duration,
}

impl RpcLedger {
    pub fn new(rpc: RpcClient, addrs: ProgramAddresses) -> Self {
        Self {
            rpc,
            addrs,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addrs
    }

    async fn fetch_position(&self, owner: Pubkey) -> LedgerResult<Option<LeveragedPosition>> {
        let address = self.addrs.position(&owner);
        let (_, accounts) = self.rpc.get_multiple_accounts(&[address]).await?;
        let data = accounts.into_iter().next().flatten();

        Ok(decode_or_none(POSITION_ACCOUNT, &address, data.as_deref(), RawPosition::decode)
            .map(|raw| raw.into_domain(address)))
    }

    async fn fetch_market(&self) -> LedgerResult<MarketQuote> {
        let keys = [self.addrs.market, self.addrs.oracle, self.addrs.multi_oracle];
        let (slot, accounts) = self.rpc.get_multiple_accounts(&keys).await?;
        let data = |i: usize| accounts.get(i).and_then(|d| d.as_deref());

        let market = decode_or_none("Market", &keys[0], data(0), RawMarket::decode);
        let oracle = decode_or_none("OracleMock", &keys[1], data(1), RawOracle::decode);
        let multi = decode_or_none(
            "MultiAssetOracle",
            &keys[2],
            data(2),
            RawMultiAssetOracle::decode,
        );

        let positive = |raw: u64| Some(Price::from_fixed(raw)).filter(Price::is_positive);
        let mut quote = MarketQuote {
            near_price: oracle.and_then(|o| positive(o.price)),
            current_slot: slot,
            ..Default::default()
        };
        if let Some(market) = market {
            quote.far_price = positive(market.t2_price);
            quote.spot_settlement_price = positive(market.t0_price);
            quote.expiry_slot = Some(market.expiry_slot);
            quote.status = Some(market.status.into());
        }
        if let Some(multi) = multi {
            quote.asset_prices.extend(multi.into_prices());
        }

        debug!(
            slot,
            near = ?quote.near_price,
            far = ?quote.far_price,
            assets = quote.asset_prices.len(),
            "Market quote fetched"
        );
        Ok(quote)
    }

    async fn fetch_holdings(&self, owner: Pubkey) -> LedgerResult<Vec<PositionHolding>> {
        let filters = vec![
            memcmp_filter(0, &account_discriminator(BET_ACCOUNT)),
            memcmp_filter(DISCRIMINATOR_LEN, owner.as_ref()),
        ];
        let accounts = self
            .rpc
            .get_program_accounts(&self.addrs.program_id, filters)
            .await?;

        let mut holdings: Vec<PositionHolding> = accounts
            .iter()
            .filter_map(|a| {
                decode_or_none(BET_ACCOUNT, &a.address, Some(a.data.as_slice()), RawBet::decode)
            })
            .map(RawBet::into_domain)
            .collect();
        holdings.sort_by_key(|h| h.id);
        Ok(holdings)
    }

    async fn fetch_all_positions(&self) -> LedgerResult<Vec<LeveragedPosition>> {
        let filters = vec![memcmp_filter(0, &account_discriminator(POSITION_ACCOUNT))];
        let accounts = self
            .rpc
            .get_program_accounts(&self.addrs.program_id, filters)
            .await?;

        Ok(accounts
            .iter()
            .filter_map(|a| {
                let data = Some(a.data.as_slice());
                decode_or_none(POSITION_ACCOUNT, &a.address, data, RawPosition::decode)
                    .map(|raw| raw.into_domain(a.address))
            })
            .collect())
    }

    async fn submit_and_confirm(
        &self,
        instructions: Vec<Instruction>,
        signer: DynSigner,
    ) -> LedgerResult<Confirmation> {
        let recent_blockhash = self.rpc.get_latest_blockhash().await?;
        let signed = signer
            .sign(UnsignedTransaction {
                instructions,
                payer: signer.identity(),
                recent_blockhash,
            })
            .await?;

        let signature = self.rpc.send_transaction(&signed.wire).await?;
        info!(%signature, "Transaction submitted");

        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self.rpc.get_signature_status(&signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = status.err {
                        return Err(LedgerError::Rejected(format!("{signature}: {err}")));
                    }
                    if status.is_confirmed() {
                        return Ok(Confirmation {
                            signature,
                            slot: status.slot,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(%signature, error = %e, "Signature status poll failed"),
            }

            if Instant::now() >= deadline {
                return Err(LedgerError::ConfirmationTimeout(signature));
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}

impl LedgerReader for RpcLedger {
    fn position(&self, owner: Pubkey) -> BoxFuture<'_, LedgerResult<Option<LeveragedPosition>>> {
        Box::pin(self.fetch_position(owner))
    }

    fn market(&self) -> BoxFuture<'_, LedgerResult<MarketQuote>> {
        Box::pin(self.fetch_market())
    }

    fn holdings(&self, owner: Pubkey) -> BoxFuture<'_, LedgerResult<Vec<PositionHolding>>> {
        Box::pin(self.fetch_holdings(owner))
    }

    fn all_positions(&self) -> BoxFuture<'_, LedgerResult<Vec<LeveragedPosition>>> {
        Box::pin(self.fetch_all_positions())
    }
}

impl LedgerWriter for RpcLedger {
    fn submit(
        &self,
        instructions: Vec<Instruction>,
        signer: DynSigner,
    ) -> BoxFuture<'_, LedgerResult<Confirmation>> {
        Box::pin(self.submit_and_confirm(instructions, signer))
    }
}
