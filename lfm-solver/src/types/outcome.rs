use super::{AuctionConfig, ClearingPrices};
use crate::Map;
use lfm_core::models::Direction;
use std::hash::Hash;

/// Executed volume below which a trade does not count towards the band.
const TRADE_EPS: f64 = 1e-6;

/// Per-slot quantities one agent trades in each direction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    /// Quantity bought, slot by slot.
    pub buy: Vec<f64>,
    /// Quantity sold, slot by slot.
    pub sell: Vec<f64>,
}

impl Allocation {
    pub(crate) fn empty(horizon: usize) -> Self {
        Self {
            buy: vec![0.0; horizon],
            sell: vec![0.0; horizon],
        }
    }

    /// Net position per slot: positive buys, negative sells.
    pub fn net(&self) -> Vec<f64> {
        self.buy
            .iter()
            .zip(&self.sell)
            .map(|(b, s)| b - s)
            .collect()
    }
}

/// The raw result of one winner determination solve.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuctionOutcome<A> {
    /// Cleared trades per agent, in first-appearance order.
    pub allocations: Map<A, Allocation>,
    /// Per-agent sums of the program's payment variables. These bound what
    /// the mechanisms may charge; they are not themselves the settlement.
    pub payments: Map<A, f64>,
    /// The surplus proxy the program maximized: buyer valuations minus
    /// seller reservations over the cleared trades.
    pub objective: f64,
}

impl<A: Clone + Eq + Hash> AuctionOutcome<A> {
    /// Values each agent's allocation at the given prices: purchases cost
    /// money, sales earn it. Slots without a price contribute nothing.
    ///
    /// `prices` must cover the same horizon as the allocations.
    pub fn costs(&self, prices: &ClearingPrices) -> Map<A, f64> {
        self.allocations
            .iter()
            .map(|(agent, allocation)| {
                let mut cost = 0.0;
                for (slot, price) in prices.buy.iter().enumerate() {
                    if let Some(price) = price {
                        cost += allocation.buy[slot] * price;
                    }
                }
                for (slot, price) in prices.sell.iter().enumerate() {
                    if let Some(price) = price {
                        cost -= allocation.sell[slot] * price;
                    }
                }
                (agent.clone(), cost)
            })
            .collect()
    }
}

/// One trade variable's worth of detail, kept around for pricing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TradeSample {
    pub(crate) slot: usize,
    pub(crate) direction: Direction,
    pub(crate) unit_cost: f64,
    pub(crate) value: f64,
}

/// A solved auction: the outcome plus enough detail to price it.
#[derive(Debug, Clone)]
pub struct AuctionSolution<A> {
    /// Who trades what, and the payment bounds the program settled on.
    pub outcome: AuctionOutcome<A>,
    pub(crate) trades: Vec<TradeSample>,
    pub(crate) horizon: usize,
    pub(crate) config: AuctionConfig,
}

impl<A> AuctionSolution<A> {
    /// Derives the clearing price band from the executed trades.
    ///
    /// For each slot, the band spans from the most expensive executed sale to
    /// the cheapest executed purchase; the configuration's weights place the
    /// two prices inside it. Slots where either side saw no volume get no
    /// price.
    pub fn price_band(&self) -> ClearingPrices {
        let mut min_buy = vec![f64::INFINITY; self.horizon];
        let mut max_sell = vec![f64::NEG_INFINITY; self.horizon];

        for trade in &self.trades {
            if trade.value > TRADE_EPS {
                match trade.direction {
                    Direction::Buy => {
                        min_buy[trade.slot] = min_buy[trade.slot].min(trade.unit_cost)
                    }
                    Direction::Sell => {
                        max_sell[trade.slot] = max_sell[trade.slot].max(trade.unit_cost)
                    }
                }
            }
        }

        let a = self.config.a();
        let b = self.config.b();
        let mut buy = vec![None; self.horizon];
        let mut sell = vec![None; self.horizon];
        for slot in 0..self.horizon {
            if min_buy[slot].is_finite() && max_sell[slot].is_finite() {
                sell[slot] = Some(max_sell[slot] * (1.0 - a) + a * min_buy[slot]);
                buy[slot] = Some(max_sell[slot] * (1.0 - b) + b * min_buy[slot]);
            }
        }

        ClearingPrices { buy, sell }
    }
}
