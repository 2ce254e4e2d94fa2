use crate::model::FoodFeatures;
use sha2::{Digest, Sha256};

/// Short, stable label for a feature tuple. Log correlation only; the cache
/// itself matches on the raw column values.
pub fn features_fingerprint(features: &FoodFeatures) -> String {
    let mut h = Sha256::new();
    for v in features.as_array() {
        h.update(v.to_le_bytes());
    }
    let mut hex = hex::encode(h.finalize());
    hex.truncate(16);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_and_order_sensitive() {
        let a = FoodFeatures::from_array([1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = FoodFeatures::from_array([2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(features_fingerprint(&a), features_fingerprint(&a));
        assert_ne!(features_fingerprint(&a), features_fingerprint(&b));
        assert_eq!(features_fingerprint(&a).len(), 16);
    }
}
