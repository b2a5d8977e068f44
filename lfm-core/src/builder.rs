mod state;

pub use state::{LoadState, NetState, SlotState, StorageState, classify};

use crate::models::{Bid, Direction, IntervalBundle, SellingBundle, SingleItemBid};

/// Quantities at or below this size are noise and never become fragments.
const FRAGMENT_EPS: f64 = 1e-9;

/// Per-slot cap on how fast the battery may move power.
#[derive(Debug, Clone)]
pub enum RampLimit {
    /// One cap applied to every slot.
    Uniform(f64),
    /// A horizon-length profile; each bundle takes its own span of it.
    PerSlot(Vec<f64>),
}

impl RampLimit {
    fn bounds(&self, start: usize, end: usize) -> Vec<f64> {
        match self {
            Self::Uniform(cap) => vec![*cap; end - start + 1],
            Self::PerSlot(caps) => caps[start..=end].to_vec(),
        }
    }
}

/// Tuning for [`build_bid`].
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Cap on per-slot purchases inside a buying bundle, if any.
    pub ramp_up: Option<RampLimit>,
    /// Cap on per-slot sales inside a selling bundle, if any.
    pub ramp_down: Option<RampLimit>,
    /// Shrink factor applied to the slot bounds of buying bundles.
    pub margin: f64,
    /// Discharge efficiency; selling reserves are inflated by its inverse.
    pub discharge_efficiency: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            ramp_up: None,
            ramp_down: None,
            margin: 0.95,
            discharge_efficiency: 0.95,
        }
    }
}

/// A raw fragment scanned off the schedule, before pricing and admission.
#[derive(Debug)]
enum Fragment {
    SingleBuy {
        slot: usize,
        quantity: f64,
    },
    BuyRun {
        start: usize,
        end: usize,
        quantity: f64,
        /// Per-slot local production available to offset purchases; all
        /// entries are non-positive.
        removable: Vec<f64>,
    },
    SellRun {
        start: usize,
        end: usize,
        capacities: Vec<f64>,
        keep: f64,
    },
}

struct BuyScan {
    start: usize,
    open_price: f64,
    quantity: f64,
    removable: Vec<f64>,
}

struct SellScan {
    start: usize,
    capacities: Vec<f64>,
    keep: f64,
}

/// Derives a bid from an agent's planned schedule.
///
/// `load` is positive when the site consumes and negative when it produces;
/// `storage` is positive when the battery charges. All four slices share one
/// length, the market horizon.
///
/// Returns the bid together with a completeness flag: `false` means at least
/// one scanned fragment was discarded, either malformed or refused by the
/// bid's consistency rules, so the bid understates the schedule.
pub fn build_bid<A>(
    agent: A,
    load: &[f64],
    storage: &[f64],
    price_buy: &[f64],
    price_sell: &[f64],
    config: &BuilderConfig,
) -> (Bid<A>, bool) {
    assert_eq!(load.len(), storage.len());
    assert_eq!(load.len(), price_buy.len());
    assert_eq!(load.len(), price_sell.len());
    if let Some(RampLimit::PerSlot(caps)) = &config.ramp_up {
        assert_eq!(caps.len(), load.len());
    }
    if let Some(RampLimit::PerSlot(caps)) = &config.ramp_down {
        assert_eq!(caps.len(), load.len());
    }

    let net: Vec<f64> = load.iter().zip(storage).map(|(l, s)| l + s).collect();
    let states = classify(load, storage);

    let mut bid = Bid::new(agent);
    let mut complete = true;

    for fragment in scan_fragments(&states, load, storage, &net, price_buy) {
        match fragment {
            Fragment::SingleBuy { slot, quantity } => {
                let single = SingleItemBid::new(slot, quantity, price_buy[slot], Direction::Buy);
                complete &= bid.add_single(single);
            }
            Fragment::BuyRun {
                start,
                end,
                quantity,
                removable,
            } => {
                let mut bound = match &config.ramp_up {
                    None => vec![quantity; end - start + 1],
                    Some(ramp) => ramp.bounds(start, end),
                };
                for (cap, extra) in bound.iter_mut().zip(&removable) {
                    *cap = (*cap + *extra) * config.margin;
                }
                let unit_cost = mean(&price_buy[start..=end]);
                match IntervalBundle::new(start, end, quantity, unit_cost, Some(bound)) {
                    Ok(bundle) => complete &= bid.add_bundle(bundle),
                    Err(_) => complete = false,
                }
            }
            Fragment::SellRun {
                start,
                end,
                capacities,
                keep,
            } => {
                let bound = match &config.ramp_down {
                    None => capacities.clone(),
                    Some(ramp) => ramp.bounds(start, end),
                };
                let reserve = bound
                    .iter()
                    .map(|cap| cap / config.discharge_efficiency)
                    .collect();
                let unit_cost = mean(&price_sell[start..=end]);
                match SellingBundle::new(start, end, capacities, keep, unit_cost, Some(reserve)) {
                    Ok(bundle) => complete &= bid.add_bundle_selling(bundle),
                    Err(_) => complete = false,
                }
            }
        }
    }

    (bid, complete)
}

/// Scans the classified schedule into fragments: residual purchases first,
/// then buying runs, then selling runs. The order is the order fragments are
/// offered to the bid, which decides who wins when intervals collide.
fn scan_fragments(
    states: &[SlotState],
    load: &[f64],
    storage: &[f64],
    net: &[f64],
    price_buy: &[f64],
) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    // Purchases that bypass the battery: direct consumption, plus whatever
    // remains of it after a discharge.
    for (t, state) in states.iter().enumerate() {
        let quantity = match (state.load, state.storage, state.net) {
            (LoadState::Consume, StorageState::Charge, NetState::Buy)
            | (LoadState::Consume, StorageState::Idle, NetState::Buy) => load[t],
            (LoadState::Consume, StorageState::Discharge, NetState::Buy) => net[t],
            _ => continue,
        };
        if quantity > FRAGMENT_EPS {
            fragments.push(Fragment::SingleBuy { slot: t, quantity });
        }
    }

    // Buying runs accumulate the energy routed into the battery. A run closes
    // only once the slot leaves the buying set AND the buy price has fallen
    // back to its opening level; elevated prices stretch the interval and let
    // local production join the per-slot headroom. A run still open at the
    // end of the horizon is dropped.
    let mut run: Option<BuyScan> = None;
    for (t, state) in states.iter().enumerate() {
        if state.is_buying() && run.is_none() {
            run = Some(BuyScan {
                start: t,
                open_price: price_buy[t],
                quantity: 0.0,
                removable: Vec::new(),
            });
        }
        if !state.is_buying() {
            if let Some(scan) = run.take_if(|scan| price_buy[t] <= scan.open_price) {
                if scan.quantity > FRAGMENT_EPS {
                    fragments.push(Fragment::BuyRun {
                        start: scan.start,
                        end: t - 1,
                        quantity: scan.quantity,
                        removable: scan.removable,
                    });
                }
            }
        }
        if let Some(scan) = run.as_mut() {
            scan.removable.push(load[t].min(0.0));
            match (state.load, state.storage, state.net) {
                (LoadState::Consume, StorageState::Charge, NetState::Buy)
                | (LoadState::Flat, StorageState::Charge, NetState::Buy) => {
                    scan.quantity += storage[t]
                }
                (LoadState::Produce, StorageState::Charge, NetState::Buy) => {
                    scan.quantity += net[t]
                }
                _ => {}
            }
        }
    }

    // Selling runs gather per-slot production as capacity and hold back the
    // energy the battery absorbs along the way. They close as soon as the
    // slot leaves the selling set, and are kept only when something beyond
    // the holdback is actually for sale.
    let mut run: Option<SellScan> = None;
    for (t, state) in states.iter().enumerate() {
        if state.is_selling() && run.is_none() {
            run = Some(SellScan {
                start: t,
                capacities: Vec::new(),
                keep: 0.0,
            });
        }
        if !state.is_selling() {
            if let Some(scan) = run.take() {
                let capacities: Vec<f64> = scan.capacities.iter().map(|c| c.abs()).collect();
                if capacities.iter().sum::<f64>() - scan.keep > FRAGMENT_EPS {
                    fragments.push(Fragment::SellRun {
                        start: scan.start,
                        end: t - 1,
                        capacities,
                        keep: scan.keep,
                    });
                }
            }
        }
        if let Some(scan) = run.as_mut() {
            scan.capacities.push(load[t]);
            if matches!(
                (state.load, state.storage, state.net),
                (LoadState::Produce, StorageState::Charge, NetState::Sell)
                    | (LoadState::Produce, StorageState::Charge, NetState::Balanced)
            ) {
                scan.keep += storage[t];
            }
        }
    }

    fragments
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
