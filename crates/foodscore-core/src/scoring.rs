use crate::classifier::Classifier;
use crate::errors::ScoreError;
use crate::fingerprint::features_fingerprint;
use crate::model::{FoodFeatures, HealthScore, ScoreResponse};
use crate::storage::FoodCache;
use crate::validate::InputValidator;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub features: FoodFeatures,
    pub score: HealthScore,
    /// True when the score came from the cache and the classifier was not called.
    pub cached: bool,
    pub fingerprint: String,
    pub response: ScoreResponse,
}

/// Request pipeline: normalize, look up, classify on miss, persist, translate.
///
/// Synchronous by construction (SQLite and the network evaluation both block);
/// async callers should run `score` on a blocking thread.
pub struct ScoringService {
    cache: FoodCache,
    classifier: Arc<dyn Classifier>,
    validator: InputValidator,
}

impl ScoringService {
    pub fn new(cache: FoodCache, classifier: Arc<dyn Classifier>) -> Result<Self, ScoreError> {
        Ok(Self {
            cache,
            classifier,
            validator: InputValidator::new()?,
        })
    }

    pub fn cache(&self) -> &FoodCache {
        &self.cache
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn score(&self, body: &Value) -> Result<ScoreOutcome, ScoreError> {
        self.score_until(body, None)
    }

    /// Like `score`, but gives up without writing once `deadline` has passed.
    ///
    /// The deadline is checked before the classifier runs and again before the
    /// insert, so a request abandoned by its caller never lands in the cache.
    pub fn score_until(
        &self,
        body: &Value,
        deadline: Option<Instant>,
    ) -> Result<ScoreOutcome, ScoreError> {
        self.validator.check(body)?;
        let features = FoodFeatures::from_json(body)?;
        self.score_features_until(features, deadline)
    }

    pub fn score_features(&self, features: FoodFeatures) -> Result<ScoreOutcome, ScoreError> {
        self.score_features_until(features, None)
    }

    pub fn score_features_until(
        &self,
        features: FoodFeatures,
        deadline: Option<Instant>,
    ) -> Result<ScoreOutcome, ScoreError> {
        let started = Instant::now();
        let fingerprint = features_fingerprint(&features);

        let (score, cached) = match self.cache.lookup(&features)? {
            Some(score) => (score, true),
            None => {
                check_deadline(deadline, started)?;
                let probability = self.classifier.predict(&features.as_array())?;
                let score = HealthScore::from_probability(probability);
                check_deadline(deadline, started)?;
                let row_id = self.cache.insert(&features, score)?;
                tracing::debug!(
                    event = "cache_insert",
                    row_id = row_id,
                    fingerprint = %fingerprint,
                    probability = probability,
                    score = score.as_i64()
                );
                (score, false)
            }
        };

        Ok(ScoreOutcome {
            features,
            score,
            cached,
            fingerprint,
            response: ScoreResponse::from(score),
        })
    }
}

fn check_deadline(deadline: Option<Instant>, started: Instant) -> Result<(), ScoreError> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(ScoreError::DeadlineExceeded {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{BrokenClassifier, FixedClassifier};
    use crate::model::{SAFE_MESSAGE, UNSAFE_MESSAGE};
    use crate::storage::Store;
    use serde_json::json;
    use tempfile::TempDir;

    fn service(dir: &TempDir, classifier: Arc<dyn Classifier>) -> ScoringService {
        let store = Store::open(&dir.path().join("db.sqlite")).unwrap();
        store.init_schema().unwrap();
        ScoringService::new(FoodCache::new(store), classifier).unwrap()
    }

    #[test]
    fn miss_classifies_and_persists() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(FixedClassifier::new(0.95));
        let svc = service(&dir, model.clone());

        let out = svc.score(&json!({"Энергия": 100})).unwrap();
        assert!(!out.cached);
        assert_eq!(out.score, HealthScore::Unsafe);
        assert_eq!(out.response.result, UNSAFE_MESSAGE);
        assert_eq!(model.calls(), 1);
        assert_eq!(svc.cache().store().count().unwrap(), 1);
    }

    #[test]
    fn hit_skips_the_classifier() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(FixedClassifier::new(0.1));
        let svc = service(&dir, model.clone());

        let first = svc.score(&json!({"Белок": 5})).unwrap();
        let second = svc.score(&json!({"Белок": 5.0})).unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.response, second.response);
        assert_eq!(second.response.result, SAFE_MESSAGE);
        assert_eq!(model.calls(), 1);
        assert_eq!(svc.cache().store().count().unwrap(), 1);
    }

    #[test]
    fn invalid_input_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(FixedClassifier::new(0.1));
        let svc = service(&dir, model.clone());

        let err = svc.score(&json!({"Белок": "five"})).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(model.calls(), 0);
        assert_eq!(svc.cache().store().count().unwrap(), 0);
    }

    #[test]
    fn model_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(BrokenClassifier));

        let err = svc.score(&json!({})).unwrap_err();
        assert_eq!(err.code(), "E_MODEL");
        assert_eq!(svc.cache().store().count().unwrap(), 0);
    }

    #[test]
    fn expired_deadline_skips_model_and_insert() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(FixedClassifier::new(0.1));
        let svc = service(&dir, model.clone());

        let err = svc.score_until(&json!({"Белок": 5}), Some(Instant::now())).unwrap_err();
        assert_eq!(err.code(), "E_TIMEOUT");
        assert_eq!(model.calls(), 0);
        assert_eq!(svc.cache().store().count().unwrap(), 0);
    }

    #[test]
    fn cache_hit_ignores_deadline() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(FixedClassifier::new(0.1)));
        svc.score(&json!({"Белок": 5})).unwrap();

        let out = svc.score_until(&json!({"Белок": 5}), Some(Instant::now())).unwrap();
        assert!(out.cached);
    }

    #[test]
    fn stored_score_wins_over_current_model() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(FixedClassifier::new(0.0)));
        let f = FoodFeatures::from_array([1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        svc.cache().insert(&f, HealthScore::Unsafe).unwrap();

        let out = svc.score_features(f).unwrap();
        assert!(out.cached);
        assert_eq!(out.score, HealthScore::Unsafe);
    }
}
