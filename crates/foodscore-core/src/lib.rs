pub mod classifier;
pub mod errors;
pub mod fingerprint;
pub mod model;
pub mod scoring;
pub mod storage;
pub mod validate;

pub use errors::ScoreError;
pub use scoring::{ScoreOutcome, ScoringService};
