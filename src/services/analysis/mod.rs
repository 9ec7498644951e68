//! Slice Analysis & Aggregation
//!
//! Bounded-concurrency fan-out of scan images to the inference boundary,
//! response parsing, and cross-image deduplication of findings.

pub mod aggregator;
pub mod prompt;
pub mod response;
pub mod scheduler;

pub use aggregator::{aggregate, group_key, provenance_label, FindingAggregator};
pub use response::{parse_slice_response, SliceAnalysis};
pub use scheduler::{
    batch_progress, AnalysisConfig, AnalysisOutcome, AnalysisProgress, AnalysisStage,
    SliceAnalysisScheduler,
};
