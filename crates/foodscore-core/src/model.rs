use crate::errors::ScoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Probability cut-off for the classifier output. Strictly below means safe.
pub const THRESHOLD: f64 = 0.9;

pub const FEATURE_COUNT: usize = 7;

/// Wire keys, in the order the classifier consumes them.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Энергия",
    "Белок",
    "Общие липиды (жиры)",
    "Углеводы",
    "Пищевые волокна",
    "Общие сахара",
    "Натрий, Na",
];

/// Cache table columns, positionally aligned with `FEATURE_COLUMNS`.
pub const STORAGE_COLUMNS: [&str; FEATURE_COUNT] = [
    "energy",
    "protein",
    "fats",
    "carbohydrates",
    "fiber",
    "sugars",
    "sodium_na",
];

pub const SAFE_MESSAGE: &str = "Продукт безопасен для употребления!!";
pub const UNSAFE_MESSAGE: &str = "Продукт небезопасно употреблять!";

/// Normalized nutrition record: kilocalories for energy, grams for the rest.
///
/// Absent keys default to zero and unknown keys are dropped, so two bodies
/// that differ only in omitted zeros normalize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodFeatures {
    #[serde(rename = "Энергия")]
    pub energy: f64,
    #[serde(rename = "Белок")]
    pub protein: f64,
    #[serde(rename = "Общие липиды (жиры)")]
    pub fats: f64,
    #[serde(rename = "Углеводы")]
    pub carbohydrates: f64,
    #[serde(rename = "Пищевые волокна")]
    pub fiber: f64,
    #[serde(rename = "Общие сахара")]
    pub sugars: f64,
    #[serde(rename = "Натрий, Na")]
    pub sodium_na: f64,
}

impl FoodFeatures {
    /// Projects a raw request body onto the canonical feature set.
    pub fn from_json(body: &Value) -> Result<Self, ScoreError> {
        if !body.is_object() {
            return Err(ScoreError::InvalidInput(format!(
                "expected a JSON object, got {}",
                json_kind(body)
            )));
        }
        Self::deserialize(body).map_err(|e| ScoreError::InvalidInput(e.to_string()))
    }

    pub fn from_array(v: [f64; FEATURE_COUNT]) -> Self {
        Self {
            energy: v[0],
            protein: v[1],
            fats: v[2],
            carbohydrates: v[3],
            fiber: v[4],
            sugars: v[5],
            sodium_na: v[6],
        }
    }

    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.energy,
            self.protein,
            self.fats,
            self.carbohydrates,
            self.fiber,
            self.sugars,
            self.sodium_na,
        ]
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Binarized classifier verdict, persisted as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthScore {
    Unsafe = 0,
    Safe = 1,
}

impl HealthScore {
    /// Lower predicted probability maps to the safe class. The direction
    /// follows the labels the classifier was trained on; do not flip it.
    pub fn from_probability(p: f64) -> Self {
        if p < THRESHOLD {
            HealthScore::Safe
        } else {
            HealthScore::Unsafe
        }
    }

    /// Anything other than 1 reads back as unsafe.
    pub fn from_stored(v: i64) -> Self {
        if v == 1 {
            HealthScore::Safe
        } else {
            HealthScore::Unsafe
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn message(self) -> &'static str {
        match self {
            HealthScore::Safe => SAFE_MESSAGE,
            HealthScore::Unsafe => UNSAFE_MESSAGE,
        }
    }
}

/// Wire response body: `{"result": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub result: String,
}

impl From<HealthScore> for ScoreResponse {
    fn from(score: HealthScore) -> Self {
        Self {
            result: score.message().to_string(),
        }
    }
}
