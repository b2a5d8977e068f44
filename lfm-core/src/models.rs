mod bid;
mod fragment;

pub use bid::Bid;
pub use fragment::{Direction, IntervalBundle, InvalidBid, SellingBundle, SingleItemBid};
