use super::outcome::TradeSample;
use super::{
    Allocation, AuctionConfig, AuctionOutcome, AuctionSolution, ClearingPrices, LinearProgram,
    LpSolution, LpSolver, Relation, Sense, SolverFailure,
};
use crate::Map;
use lfm_core::models::{Bid, Direction, InvalidBid};
use std::hash::Hash;
use tracing::{Level, event};

/// Willingness margin when deciding whether a fragment survives a price
/// band restriction.
const PRUNE_EPS: f64 = 1e-4;

/// The winner determination problem for one trading round.
///
/// Bids are admitted against a fixed market horizon, then compiled into a
/// [`LinearProgram`] whose solution decides who trades how much in each slot
/// and bounds the payments the mechanisms later settle.
#[derive(Debug, Clone)]
pub struct WinnerDetermination<A> {
    horizon: usize,
    config: AuctionConfig,
    bids: Vec<Bid<A>>,
}

/// What one LP variable stands for.
#[derive(Debug, Clone, Copy)]
enum VarKind {
    /// Quantity traded in a slot by one fragment.
    Trade {
        slot: usize,
        direction: Direction,
        unit_cost: f64,
    },
    /// A fragment's payment, bounded by its direction.
    Payment,
}

#[derive(Debug, Clone)]
struct VarTag<A> {
    agent: A,
    kind: VarKind,
}

/// A compiled winner determination program, ready to solve.
///
/// Produced by [`WinnerDetermination::build`]; holds the linear program plus
/// the bookkeeping to map its variables back onto agents and slots.
#[derive(Debug)]
pub struct AuctionProgram<A> {
    program: LinearProgram,
    tags: Vec<VarTag<A>>,
    horizon: usize,
    config: AuctionConfig,
}

impl<A: Clone + Eq + Hash> WinnerDetermination<A> {
    /// Creates an empty round over `horizon` slots.
    pub fn new(horizon: usize, config: AuctionConfig) -> Self {
        Self {
            horizon,
            config,
            bids: Vec::new(),
        }
    }

    /// The number of slots in the round.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// The bids admitted so far.
    pub fn bids(&self) -> &[Bid<A>] {
        &self.bids
    }

    /// Admits a bid, refusing any whose fragments reach outside the horizon.
    ///
    /// A refused bid is logged and dropped whole; partially admitting its
    /// fragments would change what the bidder asked for.
    pub fn add_bid(&mut self, bid: Bid<A>) -> bool {
        if let Err(err) = self.check_bid(&bid) {
            event!(Level::WARN, err = %err, "rejecting bid");
            return false;
        }
        self.bids.push(bid);
        true
    }

    fn check_bid(&self, bid: &Bid<A>) -> Result<(), InvalidBid> {
        if bid.bundles().iter().any(|b| b.end() >= self.horizon)
            || bid.selling_bundles().iter().any(|b| b.end() >= self.horizon)
            || bid.singles().iter().any(|s| s.slot() >= self.horizon)
        {
            return Err(InvalidBid::HORIZON);
        }
        Ok(())
    }

    /// Compiles the admitted bids into a linear program.
    pub fn build(&self) -> AuctionProgram<A> {
        self.assemble(None)
    }

    /// Compiles the program that would result if `agent` had never bid.
    pub fn build_without(&self, agent: &A) -> AuctionProgram<A> {
        self.assemble(Some(agent))
    }

    fn assemble(&self, excluded: Option<&A>) -> AuctionProgram<A> {
        let mut program = LinearProgram::new(Sense::Maximize);
        let mut tags: Vec<VarTag<A>> = Vec::new();
        let mut payments: Vec<usize> = Vec::new();
        let mut buying: Vec<Vec<usize>> = vec![Vec::new(); self.horizon];
        let mut selling: Vec<Vec<usize>> = vec![Vec::new(); self.horizon];

        let bids = self
            .bids
            .iter()
            .filter(|bid| excluded.is_none_or(|agent| bid.agent() != agent));

        for bid in bids {
            let agent = bid.agent();

            for bundle in bid.bundles() {
                // One trade variable per covered slot, capped by the bundle's
                // per-slot headroom; buying bundles count positively towards
                // the surplus.
                let mut slot_vars = Vec::with_capacity(bundle.len());
                for (offset, &cap) in bundle.upper_bound().iter().enumerate() {
                    let slot = bundle.start() + offset;
                    let var = program.add_variable(0.0, cap, bundle.unit_cost());
                    tags.push(VarTag {
                        agent: agent.clone(),
                        kind: VarKind::Trade {
                            slot,
                            direction: Direction::Buy,
                            unit_cost: bundle.unit_cost(),
                        },
                    });
                    buying[slot].push(var);
                    slot_vars.push(var);
                }

                // The slots together may not exceed the requested quantity
                program.add_constraint(
                    slot_vars.iter().map(|&v| (v, 1.0)).collect(),
                    Relation::LessEq,
                    bundle.quantity(),
                );

                // Payment variable and the individual-rationality tie:
                // value bought at the unit cost must cover the payment
                let payment = program.add_variable(0.0, f64::INFINITY, 0.0);
                tags.push(VarTag {
                    agent: agent.clone(),
                    kind: VarKind::Payment,
                });
                payments.push(payment);

                let mut terms: Vec<(usize, f64)> = slot_vars
                    .iter()
                    .map(|&v| (v, bundle.unit_cost()))
                    .collect();
                terms.push((payment, -1.0));
                program.add_constraint(terms, Relation::GreaterEq, 0.0);
            }

            for single in bid.singles() {
                let sign = single.direction().sign();
                let var =
                    program.add_variable(0.0, single.quantity(), sign * single.unit_cost());
                tags.push(VarTag {
                    agent: agent.clone(),
                    kind: VarKind::Trade {
                        slot: single.slot(),
                        direction: single.direction(),
                        unit_cost: single.unit_cost(),
                    },
                });
                match single.direction() {
                    Direction::Buy => buying[single.slot()].push(var),
                    Direction::Sell => selling[single.slot()].push(var),
                }

                let payment = match single.direction() {
                    Direction::Buy => program.add_variable(0.0, f64::INFINITY, 0.0),
                    Direction::Sell => program.add_variable(f64::NEG_INFINITY, 0.0, 0.0),
                };
                tags.push(VarTag {
                    agent: agent.clone(),
                    kind: VarKind::Payment,
                });
                payments.push(payment);

                program.add_constraint(
                    vec![(var, sign * single.unit_cost()), (payment, -1.0)],
                    Relation::GreaterEq,
                    0.0,
                );
            }

            for bundle in bid.selling_bundles() {
                let len = bundle.len();
                let mut slot_vars = Vec::with_capacity(len);
                for (offset, &cap) in bundle.quantities().iter().enumerate() {
                    let slot = bundle.start() + offset;
                    let var = program.add_variable(0.0, cap, -bundle.unit_cost());
                    tags.push(VarTag {
                        agent: agent.clone(),
                        kind: VarKind::Trade {
                            slot,
                            direction: Direction::Sell,
                            unit_cost: bundle.unit_cost(),
                        },
                    });
                    selling[slot].push(var);
                    slot_vars.push(var);
                }

                // Keepable constraints: for every small-enough set of slots
                // the battery could be held back in, the remaining slots must
                // still leave the reserve untouched. Offsets are local to the
                // bundle on both sides of the inequality.
                for k in 0..bundle.threshold() {
                    combinations(len, k, |held| {
                        let freed: f64 = held
                            .iter()
                            .map(|&offset| bundle.keep_quantities()[offset])
                            .sum();
                        let mut available = 0.0;
                        let mut terms = Vec::with_capacity(len - held.len());
                        for (offset, &quantity) in bundle.quantities().iter().enumerate() {
                            if held.binary_search(&offset).is_err() {
                                available += quantity;
                                terms.push((slot_vars[offset], 1.0));
                            }
                        }
                        program.add_constraint(
                            terms,
                            Relation::LessEq,
                            available + freed - bundle.keep(),
                        );
                    });
                }

                let payment = program.add_variable(f64::NEG_INFINITY, 0.0, 0.0);
                tags.push(VarTag {
                    agent: agent.clone(),
                    kind: VarKind::Payment,
                });
                payments.push(payment);

                let mut terms: Vec<(usize, f64)> = slot_vars
                    .iter()
                    .map(|&v| (v, -bundle.unit_cost()))
                    .collect();
                terms.push((payment, -1.0));
                program.add_constraint(terms, Relation::GreaterEq, 0.0);
            }
        }

        // Market balance: purchases and sales cancel out in every slot
        for slot in 0..self.horizon {
            let terms: Vec<(usize, f64)> = buying[slot]
                .iter()
                .map(|&v| (v, 1.0))
                .chain(selling[slot].iter().map(|&v| (v, -1.0)))
                .collect();
            program.add_constraint(terms, Relation::Equal, 0.0);
        }

        // Payments never cost the operator money; optionally they net to zero
        let relation = if self.config.budget_balanced {
            Relation::Equal
        } else {
            Relation::GreaterEq
        };
        program.add_constraint(
            payments.into_iter().map(|v| (v, 1.0)).collect(),
            relation,
            0.0,
        );

        AuctionProgram {
            program,
            tags,
            horizon: self.horizon,
            config: self.config,
        }
    }
}

impl<A: Clone + Eq + Hash> AuctionProgram<A> {
    /// Runs the program on a backend and maps the point back onto agents.
    pub fn solve<B: LpSolver>(&self, backend: &B) -> Result<AuctionSolution<A>, SolverFailure> {
        let solution = backend.solve(&self.program)?;
        Ok(self.extract(&solution))
    }

    /// Zeroes out every trade variable that could not survive at the given
    /// prices: fragments in unpriced slots, buyers whose willingness to pay
    /// sits below the band, and sellers whose reservation sits above it.
    ///
    /// `prices` must cover this program's horizon.
    pub fn restrict_to_band(&mut self, prices: &ClearingPrices) {
        for (variable, tag) in self.program.variables.iter_mut().zip(&self.tags) {
            let VarKind::Trade {
                slot,
                direction,
                unit_cost,
            } = tag.kind
            else {
                continue;
            };
            let kill = match direction {
                Direction::Buy => match prices.buy[slot] {
                    None => true,
                    Some(limit) => limit - unit_cost > PRUNE_EPS,
                },
                Direction::Sell => match prices.sell[slot] {
                    None => true,
                    Some(limit) => unit_cost - limit > PRUNE_EPS,
                },
            };
            if kill {
                variable.upper = 0.0;
            }
        }
    }

    fn extract(&self, solution: &LpSolution) -> AuctionSolution<A> {
        let mut allocations: Map<A, Allocation> = Map::default();
        let mut payments: Map<A, f64> = Map::default();
        let mut trades = Vec::new();

        for (tag, &value) in self.tags.iter().zip(&solution.values) {
            match tag.kind {
                VarKind::Trade {
                    slot,
                    direction,
                    unit_cost,
                } => {
                    let allocation = allocations
                        .entry(tag.agent.clone())
                        .or_insert_with(|| Allocation::empty(self.horizon));
                    match direction {
                        Direction::Buy => allocation.buy[slot] += value,
                        Direction::Sell => allocation.sell[slot] += value,
                    }
                    trades.push(TradeSample {
                        slot,
                        direction,
                        unit_cost,
                        value,
                    });
                }
                VarKind::Payment => {
                    *payments.entry(tag.agent.clone()).or_insert(0.0) += value;
                }
            }
        }

        AuctionSolution {
            outcome: AuctionOutcome {
                allocations,
                payments,
                objective: solution.objective,
            },
            trades,
            horizon: self.horizon,
            config: self.config,
        }
    }
}

/// Visits every `k`-element ascending combination of `0..n`.
fn combinations(n: usize, k: usize, mut visit: impl FnMut(&[usize])) {
    if k > n {
        return;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        visit(&idx);
        // rightmost position that can still advance
        let mut i = k;
        while i > 0 && idx[i - 1] == n - k + (i - 1) {
            i -= 1;
        }
        if i == 0 {
            break;
        }
        idx[i - 1] += 1;
        for j in i..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
