//! Pure derivations over snapshot contents.
//!
//! Every function here is total: missing or degenerate inputs produce a
//! `None`/zero result instead of an error, so a view can always render a
//! number. No function holds state or performs I/O.

use crate::{Amount, LeveragedPosition, MarketQuote, PositionHolding, PositionSide, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const BPS: Decimal = Decimal::from_parts(10000, 0, 0, false, 0);

/// P&L of a holding, tagged by whether it is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pnl {
    /// Mark-to-market P&L of an open holding.
    Unrealized(Amount),
    /// Final P&L fixed by settlement.
    Realized(Amount),
}

impl Pnl {
    #[inline]
    pub fn value(&self) -> Amount {
        match self {
            Self::Unrealized(v) | Self::Realized(v) => *v,
        }
    }

    #[inline]
    pub fn is_realized(&self) -> bool {
        matches!(self, Self::Realized(_))
    }
}

/// Quoted spread in basis points: `(far - near) / near * 10000`.
///
/// `None` when either leg is absent or `near <= 0`.
pub fn spread_bps(near: Option<Price>, far: Option<Price>) -> Option<Decimal> {
    far?.bps_from(near?)
}

/// Signed P&L of `principal` opened at `entry`, marked at `current`.
///
/// `None` when `entry <= 0` or the result leaves the `Decimal` range.
fn directional_pnl(
    side: PositionSide,
    principal: Amount,
    entry: Price,
    current: Price,
) -> Option<Amount> {
    if !entry.is_positive() {
        return None;
    }
    let pnl = principal
        .inner()
        .checked_mul(current - entry)?
        .checked_div(entry.inner())?;
    match side {
        PositionSide::Long => Some(Amount::new(pnl)),
        PositionSide::Short => Some(Amount::new(-pnl)),
    }
}

/// P&L of a holding at `current_price`.
///
/// Settled holdings report `settlement_value - principal` as realized.
/// Open holdings without a usable price, or whose P&L is out of range,
/// report zero.
pub fn unrealized_pnl(holding: &PositionHolding, current_price: Option<Price>) -> Pnl {
    if let Some(settled) = holding.settlement_value {
        return Pnl::Realized(settled - holding.principal_amount);
    }
    match current_price {
        Some(price) if price.is_positive() => Pnl::Unrealized(
            directional_pnl(
                holding.side(),
                holding.principal_amount,
                holding.entry_price,
                price,
            )
            .unwrap_or(Amount::ZERO),
        ),
        _ => Pnl::Unrealized(Amount::ZERO),
    }
}

/// Collateral value over exposure, in basis points.
///
/// `None` when `exposure_size <= 0` or the ratio overflows.
pub fn health_ratio(collateral_value: Amount, exposure_size: Amount) -> Option<Decimal> {
    if !exposure_size.is_positive() {
        return None;
    }
    collateral_value
        .inner()
        .checked_div(exposure_size.inner())?
        .checked_mul(BPS)
}

/// Health evaluation of one leveraged position at a given price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHealth {
    pub unrealized_pnl: Amount,
    /// `max(0, collateral + unrealized_pnl)`.
    pub collateral_value: Amount,
    pub health_ratio_bps: Decimal,
    /// Strictly below the maintenance threshold.
    pub needs_liquidation: bool,
}

impl PositionHealth {
    /// Evaluate `position` at `current_price`.
    ///
    /// Returns `None` when there is no usable price, the exposure is zero,
    /// or the figures overflow: an unknown health never triggers
    /// liquidation.
    pub fn evaluate(
        position: &LeveragedPosition,
        current_price: Option<Price>,
        maintenance_threshold_bps: Decimal,
    ) -> Option<Self> {
        let price = current_price.filter(Price::is_positive)?;
        let pnl = directional_pnl(position.side, position.size, position.entry_price, price)?;
        let collateral_value = Amount::new(position.collateral.inner().checked_add(pnl.inner())?)
            .floor_zero();
        let ratio = health_ratio(collateral_value, position.size)?;

        Some(Self {
            unrealized_pnl: pnl,
            collateral_value,
            health_ratio_bps: ratio,
            needs_liquidation: ratio < maintenance_threshold_bps,
        })
    }

    /// Health as a percentage (bps / 100).
    #[inline]
    pub fn health_pct(&self) -> Decimal {
        self.health_ratio_bps / Decimal::ONE_HUNDRED
    }
}

/// View-ready figures derived from the current snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Mark-to-market P&L of the leveraged position plus all open holdings.
    pub unrealized_pnl: Amount,
    /// Settled P&L over all holdings.
    pub realized_pnl: Amount,
    pub spread_bps: Option<Decimal>,
    /// Health of the watched leveraged position, in bps.
    pub health_ratio: Option<Decimal>,
}

/// Recompute every derived figure from one consistent set of snapshots.
pub fn derive_metrics(
    position: Option<&LeveragedPosition>,
    holdings: &[PositionHolding],
    quote: Option<&MarketQuote>,
    maintenance_threshold_bps: Decimal,
) -> DerivedMetrics {
    let near = quote.and_then(|q| q.near_price);
    let mut metrics = DerivedMetrics {
        spread_bps: quote.and_then(|q| spread_bps(q.near_price, q.far_price)),
        ..Default::default()
    };

    if let Some(health) = position
        .filter(|p| !p.liquidated)
        .and_then(|p| PositionHealth::evaluate(p, near, maintenance_threshold_bps))
    {
        metrics.unrealized_pnl = health.unrealized_pnl;
        metrics.health_ratio = Some(health.health_ratio_bps);
    }

    for holding in holdings {
        let price = quote.and_then(|q| q.price_for(&holding.asset_symbol));
        match unrealized_pnl(holding, price) {
            Pnl::Unrealized(v) => metrics.unrealized_pnl = metrics.unrealized_pnl + v,
            Pnl::Realized(v) => metrics.realized_pnl = metrics.realized_pnl + v,
        }
    }

    metrics
}
