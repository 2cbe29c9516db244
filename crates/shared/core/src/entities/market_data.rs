use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order book level (price + volume)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl BookLevel {
    /// Create a new book level
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

impl From<(Decimal, Decimal)> for BookLevel {
    fn from((price, volume): (Decimal, Decimal)) -> Self {
        Self::new(price, volume)
    }
}

/// Point-in-time view of an exchange order book
///
/// Levels are kept in whatever order the exchange returned them; consumers
/// must not assume best-price-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Sell side
    pub asks: Vec<BookLevel>,
    /// Buy side
    pub bids: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn new(asks: Vec<BookLevel>, bids: Vec<BookLevel>) -> Self {
        Self { asks, bids }
    }

    /// Total volume resting on the ask side
    pub fn ask_depth(&self) -> Decimal {
        self.asks.iter().map(|l| l.volume).sum()
    }

    /// Total volume resting on the bid side
    pub fn bid_depth(&self) -> Decimal {
        self.bids.iter().map(|l| l.volume).sum()
    }
}

/// Ticker summary for a pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Last traded price
    pub last: Decimal,
    /// Best bid, if the exchange reports one
    pub bid: Option<Decimal>,
    /// Best ask, if the exchange reports one
    pub ask: Option<Decimal>,
}

impl Ticker {
    pub fn new(last: Decimal, bid: Option<Decimal>, ask: Option<Decimal>) -> Self {
        Self { last, bid, ask }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_depth() {
        let book = OrderBookSnapshot::new(
            vec![(dec!(100), dec!(1)).into(), (dec!(101), dec!(2)).into()],
            vec![(dec!(99), dec!(0.5)).into()],
        );
        assert_eq!(book.ask_depth(), dec!(3));
        assert_eq!(book.bid_depth(), dec!(0.5));
        assert_eq!(OrderBookSnapshot::default().ask_depth(), dec!(0));
    }

    #[test]
    fn test_snapshot_serializes() {
        let book = OrderBookSnapshot::new(vec![BookLevel::new(dec!(1.5), dec!(2))], vec![]);
        let json = serde_json::to_string(&book).unwrap();
        let back: OrderBookSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, book);
    }
}
