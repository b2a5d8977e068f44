use thiserror::Error;

/// Which side of the market a fragment trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// The agent acquires energy.
    Buy,
    /// The agent supplies energy.
    Sell,
}

impl Direction {
    /// `+1` for buying, `-1` for selling; the sign used in the
    /// individual-rationality constraints.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

/// The various ways a bid fragment can be malformed
///
/// Construction-time violations reject the fragment before it ever reaches a
/// [`Bid`](super::Bid); the horizon check is deferred to auction admission,
/// where the trading horizon is known.
#[derive(Debug, Error)]
pub enum InvalidBid {
    /// Error when an interval ends before it starts
    #[error("interval ends before it starts")]
    INTERVAL,
    /// Error when a per-slot vector does not span the interval
    #[error("per-slot vector length does not match the interval")]
    LENGTH,
    /// Error when a selling capacity is zero or negative
    #[error("selling capacities must be strictly positive")]
    CAPACITY,
    /// Error when the keep quantity exceeds the total selling capacity
    #[error("keep quantity exceeds total capacity")]
    KEEP,
    /// Error when a fragment extends past the trading horizon
    #[error("fragment extends past the trading horizon")]
    HORIZON,
}

/// An all-or-nothing offer for exactly one time slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SingleItemBid {
    slot: usize,
    quantity: f64,
    unit_cost: f64,
    direction: Direction,
}

impl SingleItemBid {
    /// Creates a single-slot offer of `quantity` at `unit_cost` per unit.
    pub fn new(slot: usize, quantity: f64, unit_cost: f64, direction: Direction) -> Self {
        Self {
            slot,
            quantity,
            unit_cost,
            direction,
        }
    }

    /// The slot this offer is for.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The offered quantity.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// The limit price per unit.
    pub fn unit_cost(&self) -> f64 {
        self.unit_cost
    }

    /// Whether this offer buys or sells.
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// A buying offer spread over a contiguous slot interval.
///
/// Total delivery across `[start, end]` is capped by `quantity`; delivery at
/// each slot is capped by the corresponding entry of the upper-bound vector.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalBundle {
    start: usize,
    end: usize,
    quantity: f64,
    unit_cost: f64,
    upper_bound: Vec<f64>,
}

impl IntervalBundle {
    /// Creates a buying bundle over `[start, end]` (inclusive).
    ///
    /// An explicit `upper_bound` must have one entry per slot of the
    /// interval; when absent, every slot is bounded by the total `quantity`.
    pub fn new(
        start: usize,
        end: usize,
        quantity: f64,
        unit_cost: f64,
        upper_bound: Option<Vec<f64>>,
    ) -> Result<Self, InvalidBid> {
        if end < start {
            return Err(InvalidBid::INTERVAL);
        }
        let len = end - start + 1;
        let upper_bound = match upper_bound {
            Some(bound) => {
                if bound.len() != len {
                    return Err(InvalidBid::LENGTH);
                }
                bound
            }
            None => vec![quantity; len],
        };

        Ok(Self {
            start,
            end,
            quantity,
            unit_cost,
            upper_bound,
        })
    }

    /// First slot of the interval.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last slot of the interval (inclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of slots covered; at least one.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// The cap on total delivery across the interval.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// The limit price per unit, averaged over the interval by convention.
    pub fn unit_cost(&self) -> f64 {
        self.unit_cost
    }

    /// Per-slot delivery caps, indexed from `start`.
    pub fn upper_bound(&self) -> &[f64] {
        &self.upper_bound
    }

    /// Whether `slot` falls inside this bundle's interval.
    pub fn covers(&self, slot: usize) -> bool {
        self.start <= slot && slot <= self.end
    }

    /// Whether the two intervals share at least one slot.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start <= end && start <= self.end
    }
}

/// A selling offer that reserves a minimum retained quantity.
///
/// The agent offers up to `quantities[i]` at each slot of the interval but
/// insists on keeping at least `keep` in total, where retention at slot `i`
/// is itself capped by `keep_quantities[i]`. The derived [`threshold`] bounds
/// the combinatorial constraints the solver must enumerate to enforce this.
///
/// [`threshold`]: SellingBundle::threshold
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SellingBundle {
    start: usize,
    end: usize,
    quantities: Vec<f64>,
    keep: f64,
    unit_cost: f64,
    keep_quantities: Vec<f64>,
    threshold: usize,
}

impl SellingBundle {
    /// Creates a selling bundle over `[start, end]` (inclusive).
    ///
    /// Validates that the capacity vector spans the interval with strictly
    /// positive entries and that `keep` does not exceed the total capacity.
    /// `keep_quantities` defaults to `quantities`.
    pub fn new(
        start: usize,
        end: usize,
        quantities: Vec<f64>,
        keep: f64,
        unit_cost: f64,
        keep_quantities: Option<Vec<f64>>,
    ) -> Result<Self, InvalidBid> {
        if end < start {
            return Err(InvalidBid::INTERVAL);
        }
        let len = end - start + 1;
        if quantities.len() != len {
            return Err(InvalidBid::LENGTH);
        }
        if quantities.iter().any(|&q| q <= 0.0) {
            return Err(InvalidBid::CAPACITY);
        }
        if keep > quantities.iter().sum() {
            return Err(InvalidBid::KEEP);
        }
        let keep_quantities = match keep_quantities {
            Some(kq) => {
                if kq.len() != len {
                    return Err(InvalidBid::LENGTH);
                }
                kq
            }
            None => quantities.clone(),
        };

        let threshold = derive_threshold(&keep_quantities, keep);

        Ok(Self {
            start,
            end,
            quantities,
            keep,
            unit_cost,
            keep_quantities,
            threshold,
        })
    }

    /// First slot of the interval.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last slot of the interval (inclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of slots covered; at least one.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Per-slot selling capacities, indexed from `start`.
    pub fn quantities(&self) -> &[f64] {
        &self.quantities
    }

    /// The minimum total quantity the agent retains.
    pub fn keep(&self) -> f64 {
        self.keep
    }

    /// The limit price per unit.
    pub fn unit_cost(&self) -> f64 {
        self.unit_cost
    }

    /// Per-slot caps on how much can be retained.
    pub fn keep_quantities(&self) -> &[f64] {
        &self.keep_quantities
    }

    /// The smallest subset size guaranteed sufficient to cover `keep`,
    /// plus one; constraint generation enumerates subsets strictly below
    /// this size. `len + 1` when no subset of retention caps reaches `keep`.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether `slot` falls inside this bundle's interval.
    pub fn covers(&self, slot: usize) -> bool {
        self.start <= slot && slot <= self.end
    }

    /// Whether the two intervals share at least one slot.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start <= end && start <= self.end
    }
}

/// Smallest k such that the k smallest retention caps sum to at least
/// `keep`, plus one; `len + 1` when even the full vector falls short.
fn derive_threshold(keep_quantities: &[f64], keep: f64) -> usize {
    let mut sorted = keep_quantities.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut acc = 0.0;
    for (i, q) in sorted.iter().enumerate() {
        acc += q;
        if acc >= keep {
            return i + 1;
        }
    }
    sorted.len() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_law() {
        let bundle = SellingBundle::new(0, 2, vec![1.0, 2.0, 3.0], 2.5, 1.0, None).unwrap();
        assert_eq!(bundle.threshold(), 2);
    }

    #[test]
    fn threshold_counts_smallest_caps_first() {
        // Sorted caps [0.5, 1.0, 4.0]: the first alone covers keep.
        let bundle =
            SellingBundle::new(0, 2, vec![4.0, 1.0, 0.5], 0.5, 1.0, None).unwrap();
        assert_eq!(bundle.threshold(), 1);
    }

    #[test]
    fn threshold_unreachable_keep() {
        // Retention caps sum to 0.3 < keep, so no subset suffices.
        let bundle = SellingBundle::new(
            0,
            2,
            vec![1.0, 1.0, 1.0],
            2.0,
            1.0,
            Some(vec![0.1, 0.1, 0.1]),
        )
        .unwrap();
        assert_eq!(bundle.threshold(), 4);
    }

    #[test]
    fn selling_bundle_rejects_bad_geometry() {
        assert!(matches!(
            SellingBundle::new(3, 2, vec![1.0], 0.0, 1.0, None),
            Err(InvalidBid::INTERVAL)
        ));
        assert!(matches!(
            SellingBundle::new(0, 2, vec![1.0, 1.0], 0.0, 1.0, None),
            Err(InvalidBid::LENGTH)
        ));
        assert!(matches!(
            SellingBundle::new(0, 1, vec![1.0, 0.0], 0.0, 1.0, None),
            Err(InvalidBid::CAPACITY)
        ));
        assert!(matches!(
            SellingBundle::new(0, 1, vec![1.0, 1.0], 2.5, 1.0, None),
            Err(InvalidBid::KEEP)
        ));
        assert!(matches!(
            SellingBundle::new(0, 1, vec![1.0, 1.0], 1.0, 1.0, Some(vec![1.0])),
            Err(InvalidBid::LENGTH)
        ));
    }

    #[test]
    fn interval_bundle_defaults_bound_to_quantity() {
        let bundle = IntervalBundle::new(2, 4, 5.0, 1.0, None).unwrap();
        assert_eq!(bundle.upper_bound(), &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn interval_bundle_rejects_bad_geometry() {
        assert!(matches!(
            IntervalBundle::new(4, 2, 1.0, 1.0, None),
            Err(InvalidBid::INTERVAL)
        ));
        assert!(matches!(
            IntervalBundle::new(2, 4, 1.0, 1.0, Some(vec![1.0, 1.0])),
            Err(InvalidBid::LENGTH)
        ));
    }

    #[test]
    fn overlap_is_inclusive() {
        let bundle = IntervalBundle::new(2, 5, 1.0, 1.0, None).unwrap();
        assert!(bundle.overlaps(5, 7));
        assert!(bundle.overlaps(0, 2));
        assert!(!bundle.overlaps(6, 9));
        assert!(bundle.covers(2) && bundle.covers(5) && !bundle.covers(6));
    }
}
