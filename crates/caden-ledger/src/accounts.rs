//! On-chain account layouts and their conversion into domain types.

use borsh::{BorshDeserialize, BorshSerialize};
use caden_core::{
    Amount, AssetPrice, AssetType, LeveragedPosition, MarketStatus, PositionHolding, PositionSide,
    Price, PriceSource,
};
use solana_sdk::pubkey::Pubkey;

use crate::decode::decode_anchor;
use crate::error::LedgerResult;

pub const MARKET_ACCOUNT: &str = "Market";
pub const POSITION_ACCOUNT: &str = "Position";
pub const ORACLE_ACCOUNT: &str = "OracleMock";
pub const MULTI_ORACLE_ACCOUNT: &str = "MultiAssetOracle";
pub const BET_ACCOUNT: &str = "Bet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RawSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RawMarketStatus {
    Active,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RawAssetType {
    Stock,
    Crypto,
    Bond,
    Commodity,
    Forex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RawPriceSource {
    Pyth,
    Switchboard,
    Chainlink,
    CoinGecko,
    TwelveData,
    Binance,
    Manual,
    Aggregated,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RawMarket {
    pub t0_price: u64,
    pub t2_price: u64,
    pub expiry_slot: u64,
    pub status: RawMarketStatus,
    pub usdc_vault: [u8; 32],
    pub bump: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RawPosition {
    pub owner: [u8; 32],
    pub side: RawSide,
    pub size: u64,
    pub entry_price: u64,
    pub cfd_tokens: u64,
    pub leverage: u8,
    pub collateral: u64,
    pub liquidated: bool,
    pub liquidated_slot: u64,
    pub bump: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RawOracle {
    pub admin: [u8; 32],
    pub price: u64,
    pub updated_slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RawAssetPrice {
    pub asset_symbol: String,
    pub asset_type: RawAssetType,
    pub price: u64,
    pub last_updated: u64,
    pub source: RawPriceSource,
    pub confidence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RawMultiAssetOracle {
    pub admin: [u8; 32],
    pub asset_prices: Vec<RawAssetPrice>,
    pub updated_slot: u64,
    pub bump: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RawBet {
    pub owner: [u8; 32],
    pub bet_id: u64,
    pub asset_symbol: String,
    pub asset_type: RawAssetType,
    pub bet_amount: u64,
    pub is_long: bool,
    pub entry_price: u64,
    pub created_slot: u64,
    pub is_settled: bool,
    pub settlement_value: u64,
    pub bump: u8,
}

impl From<RawSide> for PositionSide {
    fn from(raw: RawSide) -> Self {
        match raw {
            RawSide::Long => Self::Long,
            RawSide::Short => Self::Short,
        }
    }
}

impl From<RawMarketStatus> for MarketStatus {
    fn from(raw: RawMarketStatus) -> Self {
        match raw {
            RawMarketStatus::Active => Self::Active,
            RawMarketStatus::Settled => Self::Settled,
        }
    }
}

impl From<RawAssetType> for AssetType {
    fn from(raw: RawAssetType) -> Self {
        match raw {
            RawAssetType::Stock => Self::Stock,
            RawAssetType::Crypto => Self::Crypto,
            RawAssetType::Bond => Self::Bond,
            RawAssetType::Commodity => Self::Commodity,
            RawAssetType::Forex => Self::Forex,
        }
    }
}

impl From<RawPriceSource> for PriceSource {
    fn from(raw: RawPriceSource) -> Self {
        match raw {
            RawPriceSource::Pyth => Self::Pyth,
            RawPriceSource::Switchboard => Self::Switchboard,
            RawPriceSource::Chainlink => Self::Chainlink,
            RawPriceSource::CoinGecko => Self::CoinGecko,
            RawPriceSource::TwelveData => Self::TwelveData,
            RawPriceSource::Binance => Self::Binance,
            RawPriceSource::Manual => Self::Manual,
            RawPriceSource::Aggregated => Self::Aggregated,
        }
    }
}

impl RawPosition {
    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        decode_anchor(POSITION_ACCOUNT, data)
    }

    pub fn into_domain(self, address: Pubkey) -> LeveragedPosition {
        LeveragedPosition {
            address,
            owner: Pubkey::new_from_array(self.owner),
            side: self.side.into(),
            size: Amount::from_fixed(self.size),
            entry_price: Price::from_fixed(self.entry_price),
            cfd_tokens: Amount::from_fixed(self.cfd_tokens),
            leverage: self.leverage,
            collateral: Amount::from_fixed(self.collateral),
            liquidated: self.liquidated,
            liquidated_slot: self.liquidated_slot,
        }
    }
}

impl RawBet {
    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        decode_anchor(BET_ACCOUNT, data)
    }

    pub fn into_domain(self) -> PositionHolding {
        PositionHolding {
            id: self.bet_id,
            asset_symbol: self.asset_symbol,
            asset_type: self.asset_type.into(),
            is_long: self.is_long,
            principal_amount: Amount::from_fixed(self.bet_amount),
            entry_price: Price::from_fixed(self.entry_price),
            created_at: self.created_slot,
            settlement_value: self
                .is_settled
                .then(|| Amount::from_fixed(self.settlement_value)),
        }
    }
}

impl RawMarket {
    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        decode_anchor(MARKET_ACCOUNT, data)
    }
}

impl RawOracle {
    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        decode_anchor(ORACLE_ACCOUNT, data)
    }
}

impl RawMultiAssetOracle {
    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        decode_anchor(MULTI_ORACLE_ACCOUNT, data)
    }

    /// Prices keyed by symbol; a later entry for the same symbol wins.
    pub fn into_prices(self) -> impl Iterator<Item = (String, AssetPrice)> {
        self.asset_prices.into_iter().map(|p| {
            (
                p.asset_symbol,
                AssetPrice {
                    asset_type: p.asset_type.into(),
                    price: Price::from_fixed(p.price),
                    last_updated: p.last_updated,
                    source: p.source.into(),
                    confidence: p.confidence,
                },
            )
        })
    }
}

/// Serialize an account the way the program lays it out. Used by fakes.
pub fn encode_anchor<T: BorshSerialize>(name: &str, account: &T) -> Vec<u8> {
    let mut out = crate::decode::account_discriminator(name).to_vec();
    // Vec<u8> writer cannot fail.
    let _ = account.serialize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_bet(is_settled: bool) -> RawBet {
        RawBet {
            owner: [3u8; 32],
            bet_id: 4,
            asset_symbol: "AAPL".to_string(),
            asset_type: RawAssetType::Stock,
            bet_amount: 25_000_000,
            is_long: true,
            entry_price: 190_500_000,
            created_slot: 1234,
            is_settled,
            settlement_value: if is_settled { 30_000_000 } else { 0 },
            bump: 255,
        }
    }

    #[test]
    fn test_position_decode_and_convert() {
        let raw = RawPosition {
            owner: [1u8; 32],
            side: RawSide::Short,
            size: 1_000_000_000,
            entry_price: 100_000_000,
            cfd_tokens: 1_000_000_000,
            leverage: 2,
            collateral: 500_000_000,
            liquidated: false,
            liquidated_slot: 0,
            bump: 254,
        };
        let bytes = encode_anchor(POSITION_ACCOUNT, &raw);
        let address = Pubkey::new_unique();

        let position = RawPosition::decode(&bytes).unwrap().into_domain(address);
        assert_eq!(position.address, address);
        assert_eq!(position.owner, Pubkey::new_from_array([1u8; 32]));
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.size.inner(), dec!(1000));
        assert_eq!(position.collateral.inner(), dec!(500));
        assert_eq!(position.entry_price.inner(), dec!(100));
    }

    #[test]
    fn test_bet_settlement_optional() {
        let open = raw_bet(false).into_domain();
        assert_eq!(open.settlement_value, None);
        assert_eq!(open.principal_amount.inner(), dec!(25));
        assert_eq!(open.entry_price.inner(), dec!(190.5));

        let settled = raw_bet(true).into_domain();
        assert_eq!(settled.settlement_value.map(|v| v.inner()), Some(dec!(30)));
    }

    #[test]
    fn test_bet_bytes_do_not_decode_as_position() {
        let bytes = encode_anchor(BET_ACCOUNT, &raw_bet(false));
        assert!(RawPosition::decode(&bytes).is_err());
        assert!(RawBet::decode(&bytes).is_ok());
    }

    #[test]
    fn test_multi_oracle_prices() {
        let raw = RawMultiAssetOracle {
            admin: [0u8; 32],
            asset_prices: vec![RawAssetPrice {
                asset_symbol: "BTC".to_string(),
                asset_type: RawAssetType::Crypto,
                price: 65_000_000_000,
                last_updated: 10,
                source: RawPriceSource::Aggregated,
                confidence: 5,
            }],
            updated_slot: 10,
            bump: 1,
        };
        let bytes = encode_anchor(MULTI_ORACLE_ACCOUNT, &raw);
        let prices: Vec<_> = RawMultiAssetOracle::decode(&bytes)
            .unwrap()
            .into_prices()
            .collect();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].0, "BTC");
        assert_eq!(prices[0].1.price.inner(), dec!(65000));
        assert_eq!(prices[0].1.source, PriceSource::Aggregated);
    }
}
