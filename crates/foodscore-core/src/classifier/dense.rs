//! Feed-forward network evaluated from an exported weights artifact.
//!
//! The artifact is JSON: an ordered list of layers. Supported kinds are
//! `normalization`, `batch_normalization` (inference form, moving statistics),
//! `dropout` (identity at inference) and `dense` with an activation.
//! Dense kernels use `[input][output]` layout.

use super::Classifier;
use crate::errors::ScoreError;
use crate::model::FEATURE_COUNT;
use serde::Deserialize;
use std::path::Path;

/// Lower bound on the normalization divisor.
const NORM_EPSILON: f64 = 1e-7;

fn default_bn_epsilon() -> f64 {
    1e-3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Normalization {
        mean: Vec<f64>,
        variance: Vec<f64>,
    },
    BatchNormalization {
        gamma: Vec<f64>,
        beta: Vec<f64>,
        moving_mean: Vec<f64>,
        moving_variance: Vec<f64>,
        #[serde(default = "default_bn_epsilon")]
        epsilon: f64,
    },
    Dropout {
        #[serde(default)]
        rate: f64,
    },
    Dense {
        kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        #[serde(default)]
        activation: Activation,
    },
}

impl Layer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        match self {
            Layer::Normalization { mean, variance } => input
                .iter()
                .zip(mean.iter().zip(variance))
                .map(|(x, (m, v))| (x - m) / v.sqrt().max(NORM_EPSILON))
                .collect(),
            Layer::BatchNormalization {
                gamma,
                beta,
                moving_mean,
                moving_variance,
                epsilon,
            } => input
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    gamma[i] * (x - moving_mean[i]) / (moving_variance[i] + epsilon).sqrt()
                        + beta[i]
                })
                .collect(),
            Layer::Dropout { .. } => input.to_vec(),
            Layer::Dense {
                kernel,
                bias,
                activation,
            } => {
                let mut out = bias.clone();
                for (x, row) in input.iter().zip(kernel) {
                    for (acc, w) in out.iter_mut().zip(row) {
                        *acc += x * w;
                    }
                }
                out.into_iter().map(|z| activation.apply(z)).collect()
            }
        }
    }

    /// Checks the layer against the incoming width and returns the outgoing one.
    fn check(&self, idx: usize, width: usize) -> Result<usize, ScoreError> {
        let fail = |msg: String| Err(ScoreError::ModelLoad(format!("layer {idx}: {msg}")));
        match self {
            Layer::Normalization { mean, variance } => {
                if mean.len() != width || variance.len() != width {
                    return fail(format!(
                        "normalization expects {width} values, got mean={} variance={}",
                        mean.len(),
                        variance.len()
                    ));
                }
                if mean.iter().any(|m| !m.is_finite()) {
                    return fail("non-finite mean".into());
                }
                if variance.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return fail("variance must be finite and non-negative".into());
                }
                Ok(width)
            }
            Layer::BatchNormalization {
                gamma,
                beta,
                moving_mean,
                moving_variance,
                epsilon,
            } => {
                let vectors = [gamma, beta, moving_mean, moving_variance];
                if vectors.iter().any(|v| v.len() != width) {
                    return fail(format!("batch normalization expects {width} values per vector"));
                }
                if vectors.iter().any(|v| v.iter().any(|x| !x.is_finite())) {
                    return fail("non-finite batch normalization weight".into());
                }
                if !(epsilon.is_finite() && *epsilon > 0.0)
                    || moving_variance.iter().any(|v| *v < 0.0)
                {
                    return fail("moving variance must be non-negative and epsilon positive".into());
                }
                Ok(width)
            }
            Layer::Dropout { rate } => {
                if !(0.0..1.0).contains(rate) {
                    return fail(format!("dropout rate {rate} outside [0, 1)"));
                }
                Ok(width)
            }
            Layer::Dense { kernel, bias, .. } => {
                if kernel.len() != width {
                    return fail(format!(
                        "kernel has {} input rows, expected {width}",
                        kernel.len()
                    ));
                }
                let out = bias.len();
                if out == 0 {
                    return fail("empty bias".into());
                }
                if let Some((r, row)) = kernel.iter().enumerate().find(|(_, row)| row.len() != out) {
                    return fail(format!("kernel row {r} has {} columns, expected {out}", row.len()));
                }
                let all_finite = bias.iter().chain(kernel.iter().flatten()).all(|w| w.is_finite());
                if !all_finite {
                    return fail("non-finite weight".into());
                }
                Ok(out)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSpec {
    #[serde(default = "default_name")]
    pub name: String,
    pub layers: Vec<Layer>,
}

fn default_name() -> String {
    "dense".to_string()
}

#[derive(Debug, Clone)]
pub struct DenseNetwork {
    name: String,
    layers: Vec<Layer>,
}

impl DenseNetwork {
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScoreError::ModelLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw).map_err(|e| match e {
            ScoreError::ModelLoad(msg) => {
                ScoreError::ModelLoad(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ScoreError> {
        let spec: NetworkSpec = serde_json::from_str(raw)
            .map_err(|e| ScoreError::ModelLoad(format!("malformed model artifact: {e}")))?;
        Self::from_spec(spec)
    }

    pub fn from_spec(spec: NetworkSpec) -> Result<Self, ScoreError> {
        if spec.layers.is_empty() {
            return Err(ScoreError::ModelLoad("model has no layers".into()));
        }
        let mut width = FEATURE_COUNT;
        for (idx, layer) in spec.layers.iter().enumerate() {
            width = layer.check(idx, width)?;
        }
        if width != 1 {
            return Err(ScoreError::ModelLoad(format!(
                "model must produce a single probability, final width is {width}"
            )));
        }
        Ok(Self {
            name: spec.name,
            layers: spec.layers,
        })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl Classifier for DenseNetwork {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ScoreError> {
        let out = self
            .layers
            .iter()
            .fold(features.to_vec(), |x, layer| layer.forward(&x));
        match out.as_slice() {
            [p] if p.is_finite() => Ok(*p),
            [p] => Err(ScoreError::ModelInvocation(format!(
                "model produced non-finite output {p}"
            ))),
            other => Err(ScoreError::ModelInvocation(format!(
                "expected output shape [1, 1], got [1, {}]",
                other.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_sigmoid(weights: [f64; 7], bias: f64) -> String {
        json!({
            "name": "single-sigmoid",
            "layers": [{
                "kind": "dense",
                "kernel": weights.iter().map(|w| vec![*w]).collect::<Vec<_>>(),
                "bias": [bias],
                "activation": "sigmoid"
            }]
        })
        .to_string()
    }

    #[test]
    fn zero_weights_give_half() {
        let net = DenseNetwork::from_json_str(&single_sigmoid([0.0; 7], 0.0)).unwrap();
        assert_eq!(net.name(), "single-sigmoid");
        let p = net.predict(&[10.0; 7]).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn hidden_layer_with_normalization() {
        let mean = vec![1.0; 7];
        let variance = vec![4.0; 7];
        let hidden = vec![vec![1.0, -1.0]; 7];
        let raw = json!({
            "layers": [
                { "kind": "normalization", "mean": mean, "variance": variance },
                {
                    "kind": "dense",
                    "kernel": hidden,
                    "bias": [0.0, 0.0],
                    "activation": "relu"
                },
                { "kind": "dense", "kernel": [[1.0], [1.0]], "bias": [0.0] }
            ]
        })
        .to_string();
        let net = DenseNetwork::from_json_str(&raw).unwrap();
        assert_eq!(net.layer_count(), 3);
        assert_eq!(net.name(), "dense");
        // (3 - 1) / 2 = 1 per feature; hidden = [7, 0] after relu; output = 7.
        let p = net.predict(&[3.0; 7]).unwrap();
        assert!((p - 7.0).abs() < 1e-12);
    }

    #[test]
    fn dropout_and_batch_normalization() {
        let kernel = vec![vec![1.0]; 7];
        let raw = json!({
            "layers": [
                {
                    "kind": "batch_normalization",
                    "gamma": vec![2.0; 7],
                    "beta": vec![1.0; 7],
                    "moving_mean": vec![3.0; 7],
                    "moving_variance": vec![4.0; 7],
                    "epsilon": 0.0001
                },
                { "kind": "dropout", "rate": 0.2 },
                { "kind": "dense", "kernel": kernel, "bias": [0.0] }
            ]
        })
        .to_string();
        let net = DenseNetwork::from_json_str(&raw).unwrap();
        assert_eq!(net.layer_count(), 3);
        // 2 * (5 - 3) / sqrt(4.0001) + 1 per feature, summed over 7 features.
        let per_feature = 2.0 * 2.0 / 4.0001f64.sqrt() + 1.0;
        let p = net.predict(&[5.0; 7]).unwrap();
        assert!((p - 7.0 * per_feature).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_dropout_and_batch_widths() {
        let kernel = vec![vec![1.0]; 7];
        let dropout = json!({
            "layers": [
                { "kind": "dropout", "rate": 1.5 },
                { "kind": "dense", "kernel": kernel, "bias": [0.0] }
            ]
        })
        .to_string();
        let err = DenseNetwork::from_json_str(&dropout).unwrap_err();
        assert!(err.to_string().contains("dropout rate"), "{err}");

        let batch = json!({
            "layers": [{
                "kind": "batch_normalization",
                "gamma": [1.0], "beta": [0.0], "moving_mean": [0.0], "moving_variance": [1.0]
            }]
        })
        .to_string();
        let err = DenseNetwork::from_json_str(&batch).unwrap_err();
        assert!(err.to_string().contains("expects 7 values"), "{err}");
    }

    #[test]
    fn rejects_wrong_input_width() {
        let kernel = vec![vec![1.0]; 6];
        let raw = json!({
            "layers": [{ "kind": "dense", "kernel": kernel, "bias": [0.0] }]
        })
        .to_string();
        let err = DenseNetwork::from_json_str(&raw).unwrap_err();
        assert_eq!(err.code(), "E_MODEL_LOAD");
        assert!(err.to_string().contains("6 input rows"), "{err}");
    }

    #[test]
    fn rejects_multi_output() {
        let kernel = vec![vec![1.0, 2.0]; 7];
        let raw = json!({
            "layers": [{ "kind": "dense", "kernel": kernel, "bias": [0.0, 0.0] }]
        })
        .to_string();
        let err = DenseNetwork::from_json_str(&raw).unwrap_err();
        assert!(err.to_string().contains("final width is 2"), "{err}");
    }

    #[test]
    fn rejects_ragged_kernel_and_empty_model() {
        let raw = json!({
            "layers": [{
                "kind": "dense",
                "kernel": [[1.0], [1.0], [1.0], [1.0, 2.0], [1.0], [1.0], [1.0]],
                "bias": [0.0]
            }]
        })
        .to_string();
        assert!(DenseNetwork::from_json_str(&raw).is_err());
        assert!(DenseNetwork::from_json_str(r#"{"layers": []}"#).is_err());
        assert!(DenseNetwork::from_json_str("not json").is_err());
    }

    #[test]
    fn overflow_is_a_model_invocation_error() {
        let kernel = vec![vec![1e308]; 7];
        let net = DenseNetwork::from_json_str(
            &json!({
                "layers": [{ "kind": "dense", "kernel": kernel, "bias": [0.0] }]
            })
            .to_string(),
        )
        .unwrap();
        let err = net.predict(&[10.0; 7]).unwrap_err();
        assert_eq!(err.code(), "E_MODEL");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DenseNetwork::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert_eq!(err.code(), "E_MODEL_LOAD");
    }
}
