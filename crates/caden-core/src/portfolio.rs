//! Portfolio summary over the holdings snapshot.

use crate::derivation::{unrealized_pnl, Pnl};
use crate::{Amount, MarketQuote, PositionHolding};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_holdings: usize,
    /// Realized P&L over settled holdings.
    pub realized_pnl: Amount,
    /// Mark-to-market P&L over open holdings.
    pub unrealized_pnl: Amount,
    pub winning: usize,
    /// Settled holdings that did not win (break-even counts here).
    pub losing: usize,
    /// Percent of settled holdings that won; zero when nothing settled.
    pub win_rate_pct: Decimal,
    pub avg_win: Amount,
    pub avg_loss: Amount,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: &[PositionHolding], quote: Option<&MarketQuote>) -> Self {
        let mut summary = Self {
            total_holdings: holdings.len(),
            ..Default::default()
        };
        let mut wins = Amount::ZERO;
        let mut losses = Amount::ZERO;
        let mut settled = 0usize;

        for holding in holdings {
            let price = quote.and_then(|q| q.price_for(&holding.asset_symbol));
            match unrealized_pnl(holding, price) {
                Pnl::Unrealized(v) => summary.unrealized_pnl = summary.unrealized_pnl + v,
                Pnl::Realized(v) => {
                    settled += 1;
                    summary.realized_pnl = summary.realized_pnl + v;
                    if v.is_positive() {
                        summary.winning += 1;
                        wins = wins + v;
                    } else if v.inner().is_sign_negative() {
                        losses = losses + v;
                    }
                }
            }
        }

        summary.losing = settled - summary.winning;
        if settled > 0 {
            summary.win_rate_pct =
                Decimal::from(summary.winning) / Decimal::from(settled) * Decimal::ONE_HUNDRED;
        }
        if summary.winning > 0 {
            summary.avg_win = Amount::new(wins.inner() / Decimal::from(summary.winning));
        }
        if summary.losing > 0 {
            summary.avg_loss = Amount::new(losses.inner() / Decimal::from(summary.losing));
        }
        summary
    }
}
