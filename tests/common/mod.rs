mod fixtures;
#[allow(unused_imports)]
pub use fixtures::*;

// Re-export commonly used types from colonyscope for tests
#[allow(unused_imports)]
pub use colonyscope::{
    analyze, analyze_batch, AnalysisConfig, BatchInput, BatchOptions, ColonyAnalyzer, ColonyError, ColonyForm,
    ColonyMargin, ResultBundle,
};
