//! Order book pricing
//!
//! Walks one side of a book, best price first, until the cumulative volume
//! covers the requested trade. The price of that level is the marginal price;
//! it is not a volume-weighted average.

use cashgate_core::{BookLevel, OrderBookSnapshot, Price, Quantity, Side};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{GatewayError, Result};

/// Computes executable prices from order book snapshots
pub struct OrderBookPricer;

impl OrderBookPricer {
    /// Marginal price to fill `volume` on `side`, or `None` if the book is too shallow
    pub fn price_to_fill(snapshot: &OrderBookSnapshot, side: Side, volume: Quantity) -> Option<Price> {
        Self::try_price_to_fill(snapshot, side, volume).ok()
    }

    /// Like [`price_to_fill`](Self::price_to_fill), reporting why no price exists
    ///
    /// A buy walks the asks lowest first; a sell walks the bids highest first,
    /// whatever order the exchange returned them in.
    pub fn try_price_to_fill(
        snapshot: &OrderBookSnapshot,
        side: Side,
        volume: Quantity,
    ) -> Result<Price> {
        if volume <= Decimal::ZERO {
            return Err(GatewayError::InvalidVolume(volume));
        }

        let available = match side {
            Side::Buy => snapshot.ask_depth(),
            Side::Sell => snapshot.bid_depth(),
        };
        if available < volume {
            return Err(GatewayError::InsufficientLiquidity {
                requested: volume,
                available,
            });
        }

        let mut cumulative = Decimal::ZERO;
        for level in Self::best_first(snapshot, side) {
            cumulative += level.volume;
            if cumulative >= volume {
                return Ok(level.price);
            }
        }
        // Only reachable with negative volumes in the book.
        Err(GatewayError::InsufficientLiquidity {
            requested: volume,
            available: cumulative,
        })
    }

    /// The side of the book a trade consumes, sorted best price first
    pub fn best_first(snapshot: &OrderBookSnapshot, side: Side) -> Vec<BookLevel> {
        let mut levels = match side {
            Side::Buy => snapshot.asks.clone(),
            Side::Sell => snapshot.bids.clone(),
        };
        match side {
            Side::Buy => levels.sort_by(|a, b| a.price.cmp(&b.price)),
            Side::Sell => levels.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        levels
    }

    /// Unit rate from the total price of `reference_volume`
    ///
    /// Buy quotes round up and sell quotes round down at `scale` places, so
    /// quotes never favour the counterparty.
    pub fn unit_rate(total: Price, reference_volume: Quantity, side: Side, scale: u32) -> Option<Price> {
        if reference_volume.is_zero() {
            return None;
        }
        let strategy = match side {
            Side::Buy => RoundingStrategy::AwayFromZero,
            Side::Sell => RoundingStrategy::ToZero,
        };
        let unit = total.checked_div(reference_volume)?;
        Some(unit.round_dp_with_strategy(scale, strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBookSnapshot {
        // Deliberately out of order.
        OrderBookSnapshot::new(
            vec![
                BookLevel::new(dec!(105), dec!(5)),
                BookLevel::new(dec!(100), dec!(1)),
                BookLevel::new(dec!(101), dec!(2)),
            ],
            vec![
                BookLevel::new(dec!(95), dec!(3)),
                BookLevel::new(dec!(99), dec!(1)),
                BookLevel::new(dec!(97), dec!(2)),
            ],
        )
    }

    #[test]
    fn test_buy_walks_asks_lowest_first() {
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Buy, dec!(2.5)), Some(dec!(101)));
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Buy, dec!(1)), Some(dec!(100)));
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Buy, dec!(8)), Some(dec!(105)));
    }

    #[test]
    fn test_sell_walks_bids_highest_first() {
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Sell, dec!(0.5)), Some(dec!(99)));
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Sell, dec!(3)), Some(dec!(97)));
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Sell, dec!(3.01)), Some(dec!(95)));
    }

    #[test]
    fn test_shallow_book_has_no_price() {
        assert_eq!(OrderBookPricer::price_to_fill(&book(), Side::Buy, dec!(10)), None);
        assert_eq!(
            OrderBookPricer::try_price_to_fill(&book(), Side::Buy, dec!(10)),
            Err(GatewayError::InsufficientLiquidity {
                requested: dec!(10),
                available: dec!(8),
            })
        );
        assert_eq!(
            OrderBookPricer::try_price_to_fill(&book(), Side::Sell, dec!(6.5)),
            Err(GatewayError::InsufficientLiquidity {
                requested: dec!(6.5),
                available: dec!(6),
            })
        );
        assert_eq!(
            OrderBookPricer::try_price_to_fill(&OrderBookSnapshot::default(), Side::Sell, dec!(1)),
            Err(GatewayError::InsufficientLiquidity {
                requested: dec!(1),
                available: Decimal::ZERO,
            })
        );
    }

    #[test]
    fn test_non_positive_volume_rejected() {
        assert_eq!(
            OrderBookPricer::try_price_to_fill(&book(), Side::Buy, Decimal::ZERO),
            Err(GatewayError::InvalidVolume(Decimal::ZERO))
        );
    }

    #[test]
    fn test_unit_rate_rounding_is_asymmetric() {
        assert_eq!(
            OrderBookPricer::unit_rate(dec!(123.456), dec!(10), Side::Buy, 2),
            Some(dec!(12.35))
        );
        assert_eq!(
            OrderBookPricer::unit_rate(dec!(123.456), dec!(10), Side::Sell, 2),
            Some(dec!(12.34))
        );
        assert_eq!(
            OrderBookPricer::unit_rate(dec!(123.4), dec!(10), Side::Buy, 2),
            Some(dec!(12.34))
        );
        assert_eq!(OrderBookPricer::unit_rate(dec!(1), Decimal::ZERO, Side::Buy, 2), None);
    }
}
