use crate::errors::ScoreError;
use crate::model::FEATURE_COUNT;

/// Opaque pretrained binary classifier: one `[1, 7]` row in, one probability out.
///
/// Implementations are loaded once and shared read-only for the life of the
/// process, hence `Send + Sync` and `&self`.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ScoreError>;
    fn name(&self) -> &str;
}

pub mod dense;
pub mod fake;

pub use dense::DenseNetwork;
pub use fake::{BrokenClassifier, FixedClassifier};
