//! Joint analysis and result records
//!
//! - Result types and the summary record
//! - Audio-only and score-informed audio feature sets
//! - Pipeline orchestration

pub mod audio;
pub mod orchestrator;
pub mod result;

pub use audio::{audio_only_features, score_informed_features};
pub use orchestrator::{JointAnalyzer, JointInputs, Step};
pub use result::{
    AudioFeatures, JointFeatures, RunMetadata, ScoreFeatures, ScoreSection, Stage, SummaryRecord,
};
