//! Graph assembly primitives: the store and the per-pass output it merges.

mod output;
mod store;

pub use output::{MergeStats, PassOutput, TargetRewrite};
pub use store::GraphStore;
