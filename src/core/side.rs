//! Trade side and sign inference.

use serde::{Deserialize, Serialize};

/// Aggressor side reported by the exchange, or `Unknown` when the upstream
/// feed does not report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
    Unknown,
}

impl Side {
    /// Parse the exchange's `BUY`/`SELL` wire values.
    pub fn from_wire(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            _ => Side::Unknown,
        }
    }
}

/// `+1` / `-1` trade sign used by the imbalance and run bar families.
///
/// `Unknown` resolves via the tick rule in [`TickRule`], which needs the
/// previous trade's price and sign; this type only carries the resolved
/// sign once known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Up = 1,
    Down = -1,
}

impl Sign {
    pub fn value(self) -> i64 {
        self as i64
    }
}

/// Tracks the running state needed to resolve `Side::Unknown` trades via the
/// tick rule: `+1` if price rose since the previous trade, `-1` if it fell,
/// else carry the previous sign. The very first resolution with no history
/// carries `+1`.
#[derive(Debug, Clone)]
pub struct TickRule {
    previous_price: Option<rust_decimal::Decimal>,
    previous_sign: Sign,
}

impl Default for TickRule {
    fn default() -> Self {
        Self {
            previous_price: None,
            previous_sign: Sign::Up,
        }
    }
}

impl TickRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the carried sign from a resumed bar's `last_trade_sign`,
    /// without a prior price (not persisted): the next `Unknown`-side trade
    /// falls back to this carried sign until a priced trade is seen.
    pub fn carry(&mut self, sign: Sign) {
        self.previous_sign = sign;
    }

    /// The most recently resolved sign, for metadata carried on a forced
    /// flush (which does not itself resolve a new trade).
    pub fn last_sign(&self) -> Sign {
        self.previous_sign
    }

    /// Resolve the sign of a trade given its side and price, updating
    /// internal tick-rule state for subsequent `Unknown`-side trades.
    pub fn resolve(&mut self, side: Side, price: rust_decimal::Decimal) -> Sign {
        let sign = match side {
            Side::Buy => Sign::Up,
            Side::Sell => Sign::Down,
            Side::Unknown => match self.previous_price {
                Some(prev) if price > prev => Sign::Up,
                Some(prev) if price < prev => Sign::Down,
                _ => self.previous_sign,
            },
        };
        self.previous_price = Some(price);
        self.previous_sign = sign;
        sign
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tick_rule_carries_previous_sign_on_tie() {
        let mut rule = TickRule::new();
        assert_eq!(rule.resolve(Side::Unknown, dec!(10)), Sign::Up);
        assert_eq!(rule.resolve(Side::Unknown, dec!(12)), Sign::Up);
        assert_eq!(rule.resolve(Side::Unknown, dec!(11)), Sign::Down);
        // Tie: carries previous (Down)
        assert_eq!(rule.resolve(Side::Unknown, dec!(11)), Sign::Down);
    }

    #[test]
    fn explicit_side_overrides_tick_rule() {
        let mut rule = TickRule::new();
        assert_eq!(rule.resolve(Side::Sell, dec!(100)), Sign::Down);
        assert_eq!(rule.resolve(Side::Buy, dec!(90)), Sign::Up);
    }
}
