use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CurrencyPair, OrderType, Side};

/// An order as submitted to the exchange
///
/// Submitted once and never mutated afterwards; a retry builds a new `Order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub side: Side,
    pub pair: CurrencyPair,
    pub order_type: OrderType,
    pub volume: Decimal,
    /// Required for Limit orders
    pub limit_price: Option<Decimal>,
}

impl Order {
    /// Create a new limit order
    pub fn limit(side: Side, pair: CurrencyPair, volume: Decimal, limit_price: Decimal) -> Self {
        Self {
            side,
            pair,
            order_type: OrderType::Limit,
            volume,
            limit_price: Some(limit_price),
        }
    }

    /// Create a new market order
    pub fn market(side: Side, pair: CurrencyPair, volume: Decimal) -> Self {
        Self {
            side,
            pair,
            order_type: OrderType::Market,
            volume,
            limit_price: None,
        }
    }

    /// Validate the order based on order type requirements
    pub fn validate(&self) -> bool {
        if self.volume <= Decimal::ZERO {
            return false;
        }
        match self.order_type {
            OrderType::Market => self.limit_price.is_none(),
            OrderType::Limit => self.limit_price.is_some_and(|p| p > Decimal::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> CurrencyPair {
        CurrencyPair::new("BTC", "USD")
    }

    #[test]
    fn test_limit_order_carries_price() {
        let order = Order::limit(Side::Buy, pair(), dec!(0.5), dec!(30000));
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.limit_price, Some(dec!(30000)));
        assert!(order.validate());
    }

    #[test]
    fn test_market_order_has_no_price() {
        let order = Order::market(Side::Sell, pair(), dec!(2));
        assert_eq!(order.order_type, OrderType::Market);
        assert!(order.limit_price.is_none());
        assert!(order.validate());
    }

    #[test]
    fn test_validate_rejects_bad_orders() {
        assert!(!Order::market(Side::Sell, pair(), Decimal::ZERO).validate());
        assert!(!Order::limit(Side::Buy, pair(), dec!(1), Decimal::ZERO).validate());

        let mut order = Order::limit(Side::Buy, pair(), dec!(1), dec!(100));
        order.limit_price = None;
        assert!(!order.validate());
    }
}
