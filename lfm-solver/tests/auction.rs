use approx::assert_abs_diff_eq;
use lfm_core::models::{Bid, Direction, IntervalBundle, SellingBundle, SingleItemBid};
use lfm_solver::{
    AuctionConfig, LinearProgram, LpSolver, Relation, Sense, SolverFailure, WinnerDetermination,
};
use rstest::*;
use rstest_reuse::{self, *};

mod all_backends;
use all_backends::all_backends;

/// One buyer willing to pay 5 and one seller asking 3, in a single slot.
#[fixture]
pub fn known_round() -> WinnerDetermination<&'static str> {
    let mut auction = WinnerDetermination::new(1, AuctionConfig::default());

    let mut buyer = Bid::new("a");
    assert!(buyer.add_single(SingleItemBid::new(0, 1.0, 5.0, Direction::Buy)));
    assert!(auction.add_bid(buyer));

    let mut seller = Bid::new("b");
    assert!(seller.add_single(SingleItemBid::new(0, 1.0, 3.0, Direction::Sell)));
    assert!(auction.add_bid(seller));

    auction
}

#[apply(all_backends)]
#[rstest]
fn solves_a_plain_program(backend: impl LpSolver) {
    let mut program = LinearProgram::new(Sense::Maximize);
    let x = program.add_variable(0.0, 2.0, 2.0);
    let y = program.add_variable(0.0, f64::INFINITY, 1.0);
    program.add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::LessEq, 3.0);

    let solution = backend.solve(&program).unwrap();
    assert_eq!((solution.values[0] * 1000.0).round(), 2000.0);
    assert_eq!((solution.values[1] * 1000.0).round(), 1000.0);
    assert_eq!((solution.objective * 1000.0).round(), 5000.0);
}

#[apply(all_backends)]
#[rstest]
fn reports_infeasible_programs(backend: impl LpSolver) {
    let mut program = LinearProgram::new(Sense::Minimize);
    let x = program.add_variable(0.0, 1.0, 1.0);
    program.add_constraint(vec![(x, 1.0)], Relation::GreaterEq, 2.0);

    assert!(matches!(
        backend.solve(&program),
        Err(SolverFailure::Infeasible)
    ));
}

#[apply(all_backends)]
#[rstest]
fn reports_unbounded_programs(backend: impl LpSolver) {
    let mut program = LinearProgram::new(Sense::Maximize);
    program.add_variable(0.0, f64::INFINITY, 1.0);

    assert!(matches!(
        backend.solve(&program),
        Err(SolverFailure::Unbounded)
    ));
}

#[apply(all_backends)]
#[rstest]
fn clears_the_known_round(backend: impl LpSolver, known_round: WinnerDetermination<&'static str>) {
    let solution = known_round.build().solve(&backend).unwrap();
    assert_eq!((solution.outcome.objective * 1000.0).round(), 2000.0);

    // Default weights put sellers at the executed ask and buyers at the
    // executed offer.
    let prices = solution.price_band();
    assert_eq!(prices.sell[0].map(|p| (p * 1000.0).round()), Some(3000.0));
    assert_eq!(prices.buy[0].map(|p| (p * 1000.0).round()), Some(5000.0));

    let costs = solution.outcome.costs(&prices);
    assert_eq!((costs["a"] * 1000.0).round(), 5000.0);
    assert_eq!((costs["b"] * 1000.0).round(), -3000.0);

    assert_eq!(
        (solution.outcome.allocations["a"].buy[0] * 1000.0).round(),
        1000.0
    );
    assert_eq!(
        (solution.outcome.allocations["b"].sell[0] * 1000.0).round(),
        1000.0
    );
}

#[apply(all_backends)]
#[rstest]
fn inframarginal_buyers_pay_the_marginal_price(backend: impl LpSolver) {
    let mut auction = WinnerDetermination::new(1, AuctionConfig::default());

    let mut eager = Bid::new("eager");
    assert!(eager.add_single(SingleItemBid::new(0, 1.0, 9.0, Direction::Buy)));
    assert!(auction.add_bid(eager));

    let mut frugal = Bid::new("frugal");
    assert!(frugal.add_single(SingleItemBid::new(0, 1.0, 5.0, Direction::Buy)));
    assert!(auction.add_bid(frugal));

    let mut well = Bid::new("well");
    assert!(well.add_single(SingleItemBid::new(0, 2.0, 3.0, Direction::Sell)));
    assert!(auction.add_bid(well));

    let solution = auction.build().solve(&backend).unwrap();
    let prices = solution.price_band();
    let costs = solution.outcome.costs(&prices);

    // Both buyers execute, so the cheapest executed offer sets the buy price
    // and the eager buyer keeps the difference to their own willingness.
    assert_eq!((costs["eager"] * 1000.0).round(), 5000.0);
    assert_eq!((costs["frugal"] * 1000.0).round(), 5000.0);
    assert_eq!((costs["well"] * 1000.0).round(), -6000.0);
}

#[apply(all_backends)]
#[rstest]
fn balances_every_slot(backend: impl LpSolver) {
    let mut auction = WinnerDetermination::new(3, AuctionConfig::default());

    let mut alpha = Bid::new("alpha");
    assert!(alpha.add_bundle(
        IntervalBundle::new(0, 2, 4.0, 8.0, Some(vec![2.0, 2.0, 2.0])).unwrap()
    ));
    assert!(auction.add_bid(alpha));

    let mut beta = Bid::new("beta");
    assert!(beta.add_single(SingleItemBid::new(1, 1.5, 7.0, Direction::Buy)));
    assert!(auction.add_bid(beta));

    let mut gamma = Bid::new("gamma");
    assert!(gamma.add_bundle_selling(
        SellingBundle::new(0, 2, vec![3.0, 3.0, 3.0], 0.0, 2.0, None).unwrap()
    ));
    assert!(auction.add_bid(gamma));

    let mut delta = Bid::new("delta");
    assert!(delta.add_single(SingleItemBid::new(1, 2.0, 6.0, Direction::Sell)));
    assert!(auction.add_bid(delta));

    let solution = auction.build().solve(&backend).unwrap();

    let mut buy = vec![0.0; 3];
    let mut sell = vec![0.0; 3];
    for allocation in solution.outcome.allocations.values() {
        for slot in 0..3 {
            buy[slot] += allocation.buy[slot];
            sell[slot] += allocation.sell[slot];
        }
    }

    let traded: f64 = buy.iter().sum();
    assert!(traded > 0.5);
    for slot in 0..3 {
        assert_abs_diff_eq!(buy[slot], sell[slot], epsilon = 1e-6);
    }
}

#[apply(all_backends)]
#[rstest]
fn respects_bundle_slot_caps(backend: impl LpSolver) {
    let mut auction = WinnerDetermination::new(3, AuctionConfig::default());

    let mut buyer = Bid::new("buyer");
    assert!(buyer.add_bundle(
        IntervalBundle::new(0, 2, 4.0, 8.0, Some(vec![2.0, 2.0, 2.0])).unwrap()
    ));
    assert!(auction.add_bid(buyer));

    let mut well = Bid::new("well");
    for slot in 0..3 {
        assert!(well.add_single(SingleItemBid::new(slot, 10.0, 2.0, Direction::Sell)));
    }
    assert!(auction.add_bid(well));

    let solution = auction.build().solve(&backend).unwrap();

    // The bundle fills completely, but no slot may exceed its own headroom.
    let allocation = &solution.outcome.allocations["buyer"];
    let total: f64 = allocation.buy.iter().sum();
    assert_abs_diff_eq!(total, 4.0, epsilon = 1e-6);
    for &value in &allocation.buy {
        assert!(value <= 2.0 + 1e-6);
    }
}

#[apply(all_backends)]
#[rstest]
fn holds_back_the_reserve(backend: impl LpSolver) {
    let mut auction = WinnerDetermination::new(2, AuctionConfig::default());

    let mut battery = Bid::new("battery");
    assert!(battery.add_bundle_selling(
        SellingBundle::new(0, 1, vec![2.0, 2.0], 1.0, 2.0, None).unwrap()
    ));
    assert!(auction.add_bid(battery));

    let mut buyer = Bid::new("buyer");
    for slot in 0..2 {
        assert!(buyer.add_single(SingleItemBid::new(slot, 5.0, 9.0, Direction::Buy)));
    }
    assert!(auction.add_bid(buyer));

    let solution = auction.build().solve(&backend).unwrap();

    // Demand outstrips the battery, but the reserve never clears.
    let allocation = &solution.outcome.allocations["battery"];
    let total: f64 = allocation.sell.iter().sum();
    assert_abs_diff_eq!(total, 3.0, epsilon = 1e-6);
}

#[apply(all_backends)]
#[rstest]
fn prices_come_from_executed_trades_only(backend: impl LpSolver) {
    let mut auction = WinnerDetermination::new(1, AuctionConfig::default());

    // The buyer's willingness sits below the ask, so nothing trades.
    let mut low = Bid::new("low");
    assert!(low.add_single(SingleItemBid::new(0, 1.0, 1.0, Direction::Buy)));
    assert!(auction.add_bid(low));

    let mut high = Bid::new("high");
    assert!(high.add_single(SingleItemBid::new(0, 1.0, 3.0, Direction::Sell)));
    assert!(auction.add_bid(high));

    let solution = auction.build().solve(&backend).unwrap();
    let prices = solution.price_band();
    assert!(prices.buy[0].is_none());
    assert!(prices.sell[0].is_none());

    let costs = solution.outcome.costs(&prices);
    for cost in costs.values() {
        assert_abs_diff_eq!(*cost, 0.0, epsilon = 1e-9);
    }
}

#[apply(all_backends)]
#[rstest]
fn collapsed_band_gives_one_price(backend: impl LpSolver) {
    let config = AuctionConfig::new(0.5, 0.5).unwrap();
    let mut auction = WinnerDetermination::new(1, config);

    let mut buyer = Bid::new("a");
    assert!(buyer.add_single(SingleItemBid::new(0, 1.0, 5.0, Direction::Buy)));
    assert!(auction.add_bid(buyer));

    let mut seller = Bid::new("b");
    assert!(seller.add_single(SingleItemBid::new(0, 1.0, 3.0, Direction::Sell)));
    assert!(auction.add_bid(seller));

    let solution = auction.build().solve(&backend).unwrap();
    let prices = solution.price_band();

    // Equal weights collapse the band to its midpoint and both sides settle
    // there, so the round nets to zero.
    assert_eq!(prices.buy[0].map(|p| (p * 1000.0).round()), Some(4000.0));
    assert_eq!(prices.sell[0].map(|p| (p * 1000.0).round()), Some(4000.0));

    let costs = solution.outcome.costs(&prices);
    let net: f64 = costs.values().sum();
    assert_abs_diff_eq!(net, 0.0, epsilon = 1e-6);
}

#[apply(all_backends)]
#[rstest]
fn budget_balance_pins_payment_bounds(backend: impl LpSolver) {
    let mut config = AuctionConfig::default();
    config.budget_balanced = true;
    let mut auction = WinnerDetermination::new(1, config);

    let mut buyer = Bid::new("a");
    assert!(buyer.add_single(SingleItemBid::new(0, 1.0, 5.0, Direction::Buy)));
    assert!(auction.add_bid(buyer));

    let mut seller = Bid::new("b");
    assert!(seller.add_single(SingleItemBid::new(0, 1.0, 3.0, Direction::Sell)));
    assert!(auction.add_bid(seller));

    let solution = auction.build().solve(&backend).unwrap();

    // The program's own payment variables must net to zero exactly.
    let net: f64 = solution.outcome.payments.values().sum();
    assert_abs_diff_eq!(net, 0.0, epsilon = 1e-6);
}

/// The OSQP backend trades precision for speed; check it against the same
/// known round when its feature is enabled.
#[cfg(feature = "osqp")]
#[rstest]
fn osqp_agrees_on_the_known_round(known_round: WinnerDetermination<&'static str>) {
    let backend = lfm_solver::osqp::OsqpSolver::default();
    let solution = known_round.build().solve(&backend).unwrap();

    let prices = solution.price_band();
    let costs = solution.outcome.costs(&prices);
    assert_eq!((costs["a"] * 1000.0).round(), 5000.0);
    assert_eq!((costs["b"] * 1000.0).round(), -3000.0);
}

/// Infeasibility must surface as its own failure, not a generic termination.
#[cfg(feature = "osqp")]
#[rstest]
fn osqp_reports_infeasible_programs() {
    let backend = lfm_solver::osqp::OsqpSolver::default();
    let mut program = LinearProgram::new(Sense::Minimize);
    let x = program.add_variable(0.0, 1.0, 1.0);
    program.add_constraint(vec![(x, 1.0)], Relation::GreaterEq, 2.0);

    assert!(matches!(
        backend.solve(&program),
        Err(SolverFailure::Infeasible)
    ));
}

#[cfg(feature = "osqp")]
#[rstest]
fn osqp_reports_unbounded_programs() {
    let backend = lfm_solver::osqp::OsqpSolver::default();
    let mut program = LinearProgram::new(Sense::Maximize);
    program.add_variable(0.0, f64::INFINITY, 1.0);

    assert!(matches!(
        backend.solve(&program),
        Err(SolverFailure::Unbounded)
    ));
}
