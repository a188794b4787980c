//! Analysis modules.
//!
//! The pipeline fetches every source concurrently, the aggregator merges
//! the outcomes and the risk module scores the region.

pub mod aggregator;
pub mod pipeline;
pub mod risk;

pub use aggregator::SourceOutcome;
pub use pipeline::Pipeline;
