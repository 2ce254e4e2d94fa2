use super::Classifier;
use crate::errors::ScoreError;
use crate::model::FEATURE_COUNT;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns the same probability for every input and counts invocations.
#[derive(Debug, Default)]
pub struct FixedClassifier {
    probability: f64,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FixedClassifier {
    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, ScoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Always fails, for exercising the model error path.
#[derive(Debug, Default)]
pub struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, ScoreError> {
        Err(ScoreError::ModelInvocation("classifier unavailable".into()))
    }

    fn name(&self) -> &str {
        "broken"
    }
}
