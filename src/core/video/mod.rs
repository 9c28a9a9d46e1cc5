pub mod diff_filter;
pub mod frame;
pub mod source;

pub use diff_filter::{HistogramCorrelation, SimilarityEstimator, MAX_SIMILARITY};
pub use frame::Frame;
pub use source::{CommandFrameSource, FrameSource};
