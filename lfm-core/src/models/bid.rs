use super::{Direction, IntervalBundle, SellingBundle, SingleItemBid};

/// A full expression of one agent's preferences for a trading round.
///
/// A bid aggregates single-item offers, buying interval bundles and selling
/// bundles, and enforces their mutual consistency: bundle-kind fragments
/// never overlap each other, a single never shares a slot with a bundle of
/// the opposite direction, and each slot holds at most one single.
///
/// The `add_*` methods are transactional: a fragment that would violate an
/// invariant is refused, the method returns `false`, and the bid is left
/// exactly as it was.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bid<A> {
    agent: A,
    bundles: Vec<IntervalBundle>,
    selling: Vec<SellingBundle>,
    singles: Vec<SingleItemBid>,
}

impl<A> Bid<A> {
    /// Creates an empty bid owned by `agent`.
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            bundles: Vec::new(),
            selling: Vec::new(),
            singles: Vec::new(),
        }
    }

    /// The owning agent.
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// The buying interval bundles admitted so far.
    pub fn bundles(&self) -> &[IntervalBundle] {
        &self.bundles
    }

    /// The selling bundles admitted so far.
    pub fn selling_bundles(&self) -> &[SellingBundle] {
        &self.selling
    }

    /// The single-item offers admitted so far.
    pub fn singles(&self) -> &[SingleItemBid] {
        &self.singles
    }

    /// Whether the bid carries no fragments at all.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty() && self.selling.is_empty() && self.singles.is_empty()
    }

    /// Admits a buying interval bundle.
    ///
    /// Refused when the interval overlaps any existing bundle (buying or
    /// selling), or when a sell-direction single sits inside it.
    pub fn add_bundle(&mut self, bundle: IntervalBundle) -> bool {
        let overlap = self
            .bundles
            .iter()
            .any(|b| b.overlaps(bundle.start(), bundle.end()))
            || self
                .selling
                .iter()
                .any(|b| b.overlaps(bundle.start(), bundle.end()));
        let opposed = self
            .singles
            .iter()
            .any(|s| bundle.covers(s.slot()) && s.direction() == Direction::Sell);

        if overlap || opposed {
            return false;
        }
        self.bundles.push(bundle);
        true
    }

    /// Admits a single-item offer.
    ///
    /// Refused when its slot already holds a single (either direction), when
    /// a buying bundle covers the slot and the single sells, or when a
    /// selling bundle covers the slot and the single buys.
    pub fn add_single(&mut self, single: SingleItemBid) -> bool {
        let taken = self.singles.iter().any(|s| s.slot() == single.slot());
        let against_buy = single.direction() == Direction::Sell
            && self.bundles.iter().any(|b| b.covers(single.slot()));
        let against_sell = single.direction() == Direction::Buy
            && self.selling.iter().any(|b| b.covers(single.slot()));

        if taken || against_buy || against_sell {
            return false;
        }
        self.singles.push(single);
        true
    }

    /// Admits a selling bundle.
    ///
    /// Refused when a buy-direction single sits inside the interval, or when
    /// the interval overlaps any existing bundle (buying or selling).
    pub fn add_bundle_selling(&mut self, bundle: SellingBundle) -> bool {
        let opposed = self
            .singles
            .iter()
            .any(|s| bundle.covers(s.slot()) && s.direction() == Direction::Buy);
        let overlap = self
            .bundles
            .iter()
            .any(|b| b.overlaps(bundle.start(), bundle.end()))
            || self
                .selling
                .iter()
                .any(|b| b.overlaps(bundle.start(), bundle.end()));

        if opposed || overlap {
            return false;
        }
        self.selling.push(bundle);
        true
    }
}
