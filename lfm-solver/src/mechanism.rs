use crate::{
    Allocation, AuctionConfig, AuctionProgram, AuctionSolution, ClearingPrices, LpSolver, Map, Set,
    SolverFailure, WinnerDetermination,
};
use lfm_core::models::Bid;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::hash::Hash;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Level, event};

/// What a settlement mechanism hands back: the cleared trades, the money that
/// changes hands, and the clearing prices when a single band describes the
/// whole round.
///
/// Positive payments flow from the agent to the market; negative payments are
/// payouts.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MechanismOutcome<A> {
    /// Cleared trades per agent.
    pub allocations: Map<A, Allocation>,
    /// What each agent owes, or is owed, for the round.
    pub payments: Map<A, f64>,
    /// The band the settlement was computed from, when every agent is priced
    /// off one solve.
    pub prices: Option<ClearingPrices>,
    /// The cleared surplus proxy, summed over sub-markets where applicable.
    pub objective: f64,
}

/// Hands a compiled program to the blocking pool.
fn spawn_solve<A, B>(
    program: AuctionProgram<A>,
    backend: &Arc<B>,
) -> JoinHandle<Result<AuctionSolution<A>, SolverFailure>>
where
    A: Clone + Eq + Hash + Send + 'static,
    B: LpSolver + Send + Sync + 'static,
{
    let backend = Arc::clone(backend);
    tokio::task::spawn_blocking(move || program.solve(backend.as_ref()))
}

/// Like [`spawn_solve`], but returns the program so it can be restricted and
/// solved again.
fn spawn_round<A, B>(
    program: AuctionProgram<A>,
    backend: &Arc<B>,
) -> JoinHandle<(AuctionProgram<A>, Result<AuctionSolution<A>, SolverFailure>)>
where
    A: Clone + Eq + Hash + Send + 'static,
    B: LpSolver + Send + Sync + 'static,
{
    let backend = Arc::clone(backend);
    tokio::task::spawn_blocking(move || {
        let result = program.solve(backend.as_ref());
        (program, result)
    })
}

/// Clears the round once and settles everyone at the resulting price band.
///
/// Each agent pays or earns the band price on every unit they trade, so two
/// agents trading the same profile in the same slots settle identically
/// regardless of what they bid.
pub async fn uniform<A, B>(
    bids: Vec<Bid<A>>,
    horizon: usize,
    config: AuctionConfig,
    backend: B,
) -> Result<MechanismOutcome<A>, SolverFailure>
where
    A: Clone + Eq + Hash + Send + 'static,
    B: LpSolver + Send + Sync + 'static,
{
    let backend = Arc::new(backend);
    let mut auction = WinnerDetermination::new(horizon, config);
    for bid in bids {
        auction.add_bid(bid);
    }

    let solution = spawn_solve(auction.build(), &backend)
        .await
        .expect("solver task panicked")?;
    let prices = solution.price_band();
    let payments = solution.outcome.costs(&prices);

    Ok(MechanismOutcome {
        allocations: solution.outcome.allocations,
        payments,
        prices: Some(prices),
        objective: solution.outcome.objective,
    })
}

/// Clears the round, then charges each agent for the externality their
/// participation imposes on everyone else.
///
/// An agent's payment compares the rest of the market's settlement with them
/// present against a counterfactual clearing without their bid, so shading a
/// unit cost cannot lower it. The collected payments run a weak surplus
/// rather than netting to zero.
pub async fn marginal<A, B>(
    bids: Vec<Bid<A>>,
    horizon: usize,
    config: AuctionConfig,
    backend: B,
) -> Result<MechanismOutcome<A>, SolverFailure>
where
    A: Clone + Eq + Hash + Send + 'static,
    B: LpSolver + Send + Sync + 'static,
{
    let backend = Arc::new(backend);
    let mut auction = WinnerDetermination::new(horizon, config);
    let mut agents: Set<A> = Set::default();
    for bid in bids {
        let agent = bid.agent().clone();
        if auction.add_bid(bid) {
            agents.insert(agent);
        }
    }

    let baseline = spawn_solve(auction.build(), &backend)
        .await
        .expect("solver task panicked")?;
    let prices = baseline.price_band();
    let costs = baseline.outcome.costs(&prices);
    let total: f64 = costs.values().sum();

    event!(
        Level::DEBUG,
        agents = agents.len(),
        "pricing marginal contributions"
    );

    // One counterfactual clearing per agent, all in flight at once.
    let handles: Vec<_> = agents
        .iter()
        .map(|agent| spawn_solve(auction.build_without(agent), &backend))
        .collect();

    let mut payments: Map<A, f64> = Map::default();
    for (agent, handle) in agents.into_iter().zip(handles) {
        let counterfactual = handle.await.expect("solver task panicked")?;
        let band = counterfactual.price_band();
        let remainder: f64 = counterfactual.outcome.costs(&band).values().sum();
        let own = costs.get(&agent).copied().unwrap_or(0.0);
        payments.insert(agent, total - own - remainder);
    }

    Ok(MechanismOutcome {
        allocations: baseline.outcome.allocations,
        payments,
        prices: Some(prices),
        objective: baseline.outcome.objective,
    })
}

/// Splits the bidders into two sub-markets at random and settles each side at
/// the other side's clearing prices.
///
/// No bid influences the band it settles at. After the bands are exchanged,
/// each side is re-solved with the fragments that cannot trade at the other
/// side's prices removed, then priced at that band. The partition is drawn
/// from `seed` alone, so a round can be replayed exactly.
pub async fn randomized_split<A, B>(
    bids: Vec<Bid<A>>,
    horizon: usize,
    config: AuctionConfig,
    seed: u64,
    backend: B,
) -> Result<MechanismOutcome<A>, SolverFailure>
where
    A: Clone + Eq + Hash + Send + 'static,
    B: LpSolver + Send + Sync + 'static,
{
    let backend = Arc::new(backend);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut left = WinnerDetermination::new(horizon, config);
    let mut right = WinnerDetermination::new(horizon, config);
    for bid in bids {
        if rng.random_bool(0.5) {
            left.add_bid(bid);
        } else {
            right.add_bid(bid);
        }
    }
    event!(
        Level::DEBUG,
        left = left.bids().len(),
        right = right.bids().len(),
        "partitioned bids"
    );

    let left_handle = spawn_round(left.build(), &backend);
    let right_handle = spawn_round(right.build(), &backend);
    let (mut left_program, left_result) = left_handle.await.expect("solver task panicked");
    let (mut right_program, right_result) = right_handle.await.expect("solver task panicked");
    let left_band = left_result?.price_band();
    let right_band = right_result?.price_band();

    // Each side is pruned, and later priced, by the other side's band.
    left_program.restrict_to_band(&right_band);
    right_program.restrict_to_band(&left_band);

    let left_handle = spawn_solve(left_program, &backend);
    let right_handle = spawn_solve(right_program, &backend);
    let left = left_handle.await.expect("solver task panicked")?;
    let right = right_handle.await.expect("solver task panicked")?;

    let mut payments = left.outcome.costs(&right_band);
    for (agent, cost) in right.outcome.costs(&left_band) {
        *payments.entry(agent).or_insert(0.0) += cost;
    }

    // An agent whose bids landed on both sides trades in both sub-markets.
    let mut allocations = left.outcome.allocations;
    for (agent, incoming) in right.outcome.allocations {
        match allocations.get_mut(&agent) {
            Some(existing) => {
                for (slot, value) in incoming.buy.iter().enumerate() {
                    existing.buy[slot] += value;
                }
                for (slot, value) in incoming.sell.iter().enumerate() {
                    existing.sell[slot] += value;
                }
            }
            None => {
                allocations.insert(agent, incoming);
            }
        }
    }

    Ok(MechanismOutcome {
        allocations,
        payments,
        // The sides clear at each other's bands; no single price vector
        // describes the round.
        prices: None,
        objective: left.outcome.objective + right.outcome.objective,
    })
}
