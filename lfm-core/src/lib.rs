#![warn(missing_docs)]
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

/// Core domain models for the flexibility auction.
///
/// The entities here are the vocabulary of the market: bid fragments with
/// their construction-time validation, and the per-agent [`Bid`](models::Bid)
/// aggregate that enforces mutual consistency between fragments. They carry
/// no optimization logic; `lfm-solver` consumes them to build the winner
/// determination problem.
pub mod models;

/// Conversion of dispatch trajectories into bids.
///
/// A finite-state consolidation pass over a per-slot (load, storage-action)
/// trajectory, classifying each slot and emitting single-item and bundle
/// fragments. This is the only place bids are produced from raw numeric
/// data; everything downstream treats the resulting [`Bid`](models::Bid) as
/// immutable.
pub mod builder;
