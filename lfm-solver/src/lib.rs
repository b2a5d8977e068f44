/**
 * These are the linear-programming backends the auction can run on.
 */
mod impls;
pub use impls::*;

/**
 * These are the core data types the auction engine operates on.
 */
mod types;
pub use types::*;

/**
 * These are the settlement mechanisms assembled on top of the winner
 * determination program.
 */
mod mechanism;
pub use mechanism::*;

// We use non-std collections here for their ordering semantics and performance
pub(crate) type Map<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;
pub(crate) type Set<T> = indexmap::IndexSet<T, rustc_hash::FxBuildHasher>;
