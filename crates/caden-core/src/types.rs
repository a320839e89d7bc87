//! Decoded ledger entities.
//!
//! These are the already-decoded, representation-independent views of
//! program accounts. Nothing here knows about wire encodings; the ledger
//! crate converts raw account bytes into these types.

use crate::{Amount, Price};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;

/// Direction of a leveraged position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn from_is_long(is_long: bool) -> Self {
        if is_long {
            Self::Long
        } else {
            Self::Short
        }
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long)
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Stock,
    Crypto,
    Bond,
    Commodity,
    Forex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceSource {
    Pyth,
    Switchboard,
    Chainlink,
    CoinGecko,
    TwelveData,
    Binance,
    Manual,
    Aggregated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Settled,
}

/// A settlement instrument held by the watched owner.
///
/// `settlement_value` moves from `None` to `Some` exactly once, when the
/// remote program settles the instrument. The client never sets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHolding {
    pub id: u64,
    pub asset_symbol: String,
    pub asset_type: AssetType,
    pub is_long: bool,
    pub principal_amount: Amount,
    pub entry_price: Price,
    /// Ledger slot the holding was opened in.
    pub created_at: u64,
    pub settlement_value: Option<Amount>,
}

impl PositionHolding {
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.settlement_value.is_some()
    }

    #[inline]
    pub fn side(&self) -> PositionSide {
        PositionSide::from_is_long(self.is_long)
    }
}

/// A collateralized leveraged position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeveragedPosition {
    /// Account address of the position (the liquidation target).
    pub address: Pubkey,
    pub owner: Pubkey,
    pub side: PositionSide,
    /// Exposure size in collateral units.
    pub size: Amount,
    pub entry_price: Price,
    pub cfd_tokens: Amount,
    pub leverage: u8,
    pub collateral: Amount,
    pub liquidated: bool,
    pub liquidated_slot: u64,
}

/// Per-asset oracle price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset_type: AssetType,
    pub price: Price,
    pub last_updated: u64,
    pub source: PriceSource,
    pub confidence: u64,
}

/// Composite market snapshot.
///
/// Each leg is optional: a missing or malformed account yields `None`
/// for that leg rather than failing the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Live oracle price (the near leg of the spread).
    pub near_price: Option<Price>,
    /// Deferred settlement price (the far leg of the spread).
    pub far_price: Option<Price>,
    pub spot_settlement_price: Option<Price>,
    pub expiry_slot: Option<u64>,
    pub status: Option<MarketStatus>,
    pub current_slot: u64,
    /// Prices keyed by asset symbol.
    pub asset_prices: BTreeMap<String, AssetPrice>,
}

impl MarketQuote {
    /// Current price for an asset symbol, falling back to the live oracle.
    pub fn price_for(&self, symbol: &str) -> Option<Price> {
        self.asset_prices
            .get(symbol)
            .map(|p| p.price)
            .filter(|p| p.is_positive())
            .or(self.near_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn asset(price: Price) -> AssetPrice {
        AssetPrice {
            asset_type: AssetType::Crypto,
            price,
            last_updated: 1,
            source: PriceSource::Pyth,
            confidence: 0,
        }
    }

    #[test]
    fn test_price_for_prefers_asset_price() {
        let mut quote = MarketQuote {
            near_price: Some(Price::new(dec!(50))),
            ..Default::default()
        };
        quote
            .asset_prices
            .insert("BTC".to_string(), asset(Price::new(dec!(60000))));

        assert_eq!(quote.price_for("BTC"), Some(Price::new(dec!(60000))));
        assert_eq!(quote.price_for("ETH"), Some(Price::new(dec!(50))));
    }

    #[test]
    fn test_price_for_ignores_zero_asset_price() {
        let mut quote = MarketQuote::default();
        quote.asset_prices.insert("AAPL".to_string(), asset(Price::ZERO));
        assert_eq!(quote.price_for("AAPL"), None);
    }

    #[test]
    fn test_holding_settled_flag() {
        let mut holding = PositionHolding {
            id: 1,
            asset_symbol: "BTC".to_string(),
            asset_type: AssetType::Crypto,
            is_long: false,
            principal_amount: Amount::new(dec!(10)),
            entry_price: Price::new(dec!(100)),
            created_at: 5,
            settlement_value: None,
        };
        assert!(!holding.is_settled());
        assert_eq!(holding.side(), PositionSide::Short);
        holding.settlement_value = Some(Amount::new(dec!(12)));
        assert!(holding.is_settled());
    }
}
