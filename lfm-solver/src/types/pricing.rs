/// Error when the band weights are out of order or out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("price band weights must satisfy 0 <= a <= b <= 1")]
pub struct InvalidPricing;

/// Pricing and settlement tuning for an auction.
///
/// The weights `a` and `b` place the two clearing prices inside the band
/// spanned by the most expensive executed sale and the cheapest executed
/// purchase of each slot: the seller side sits at fraction `a` of the way
/// across, the buyer side at fraction `b`. The default `(0, 1)` is the widest
/// spread; `a = b` collapses both sides onto a single price.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuctionConfig {
    a: f64,
    b: f64,
    /// Force payments to sum to exactly zero instead of merely never losing
    /// money for the operator.
    pub budget_balanced: bool,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            a: 0.0,
            b: 1.0,
            budget_balanced: false,
        }
    }
}

impl AuctionConfig {
    /// Creates a configuration, checking `0 <= a <= b <= 1`.
    pub fn new(a: f64, b: f64) -> Result<Self, InvalidPricing> {
        if 0.0 <= a && a <= b && b <= 1.0 {
            Ok(Self {
                a,
                b,
                budget_balanced: false,
            })
        } else {
            Err(InvalidPricing)
        }
    }

    /// The seller-side interpolation weight.
    pub fn a(&self) -> f64 {
        self.a
    }

    /// The buyer-side interpolation weight.
    pub fn b(&self) -> f64 {
        self.b
    }
}

/// Per-slot clearing prices derived from a solved auction.
///
/// A slot where no trade executed on both sides carries no price at all,
/// rather than a sentinel value that could leak into arithmetic.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClearingPrices {
    /// What buyers pay per unit, slot by slot.
    pub buy: Vec<Option<f64>>,
    /// What sellers receive per unit, slot by slot.
    pub sell: Vec<Option<f64>>,
}

impl ClearingPrices {
    /// The number of slots the prices cover.
    pub fn horizon(&self) -> usize {
        self.buy.len()
    }
}
