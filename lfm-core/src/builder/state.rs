/// Absolute tolerance below which a per-slot value reads as zero.
const CLASSIFY_EPS: f64 = 1e-8;

/// Sign of the uncontrollable load in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The site draws power.
    Consume,
    /// The site generates more than it uses.
    Produce,
    /// No appreciable load either way.
    Flat,
}

/// What the battery is doing in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// Power flows into the battery.
    Charge,
    /// Power flows out of the battery.
    Discharge,
    /// The battery is not in use.
    Idle,
}

/// Direction of the net position a slot presents to the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetState {
    /// Load plus storage draws from the market.
    Buy,
    /// Load plus storage feeds the market.
    Sell,
    /// Load and storage cancel out.
    Balanced,
}

/// Classified behavior of one schedule slot.
///
/// The three axes are judged independently with a small absolute tolerance,
/// so near-zero values read as [`LoadState::Flat`], [`StorageState::Idle`] or
/// [`NetState::Balanced`] instead of picking up a sign from noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotState {
    /// Sign of the uncontrollable load.
    pub load: LoadState,
    /// What the battery is doing.
    pub storage: StorageState,
    /// Sign of load plus storage.
    pub net: NetState,
}

impl SlotState {
    /// Classifies one slot from its load and storage power.
    pub fn new(load: f64, storage: f64) -> Self {
        let net = load + storage;
        Self {
            load: if load.abs() <= CLASSIFY_EPS {
                LoadState::Flat
            } else if load > 0.0 {
                LoadState::Consume
            } else {
                LoadState::Produce
            },
            storage: if storage.abs() <= CLASSIFY_EPS {
                StorageState::Idle
            } else if storage > 0.0 {
                StorageState::Charge
            } else {
                StorageState::Discharge
            },
            net: if net.abs() <= CLASSIFY_EPS {
                NetState::Balanced
            } else if net > 0.0 {
                NetState::Buy
            } else {
                NetState::Sell
            },
        }
    }

    /// Whether this slot can open or extend a buying run.
    ///
    /// Fully idle slots count, so a stretch of inactivity does not interrupt
    /// a surrounding run; it simply contributes nothing to it.
    pub fn is_buying(&self) -> bool {
        matches!(
            (self.load, self.storage, self.net),
            (LoadState::Consume, StorageState::Charge, NetState::Buy)
                | (LoadState::Consume, StorageState::Idle, NetState::Buy)
                | (LoadState::Flat, StorageState::Charge, NetState::Buy)
                | (LoadState::Flat, StorageState::Idle, NetState::Balanced)
                | (LoadState::Produce, StorageState::Charge, NetState::Buy)
                | (LoadState::Produce, StorageState::Charge, NetState::Balanced)
        )
    }

    /// Whether this slot can open or extend a selling run.
    ///
    /// A producing slot whose surplus exactly feeds the battery sits in both
    /// camps, so `is_buying` and `is_selling` are not mutually exclusive.
    pub fn is_selling(&self) -> bool {
        matches!(
            (self.load, self.storage, self.net),
            (LoadState::Produce, StorageState::Charge, NetState::Sell)
                | (LoadState::Produce, StorageState::Charge, NetState::Balanced)
                | (LoadState::Produce, StorageState::Idle, NetState::Sell)
        )
    }
}

/// Classifies a whole schedule slot by slot.
///
/// `load` and `storage` must have the same length; positive load consumes,
/// positive storage charges.
pub fn classify(load: &[f64], storage: &[f64]) -> Vec<SlotState> {
    load.iter()
        .zip(storage)
        .map(|(&l, &s)| SlotState::new(l, s))
        .collect()
}
