use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};
// Core components from shared library
use playground_helpers::{argmax, DataPoint, Float};

mod config;
#[cfg(feature = "serde")]
mod persist;

pub use config::TrainConfig;

/// Errors that can occur when building, training or running a network.
#[derive(Debug, Error)]
pub enum MlpError {
    /// The layer sizes do not describe a usable network.
    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),
    /// An input row does not have as many features as the first layer expects.
    #[error("expected {expected} input features, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// A training label does not name one of the output classes.
    #[error("label {label} is out of range for {classes} classes")]
    InvalidLabel { label: usize, classes: usize },
    /// The number of labels differs from the number of input rows.
    #[error("{labels} labels supplied for {rows} input rows")]
    LabelCountMismatch { labels: usize, rows: usize },
    /// Cannot train or evaluate on an empty data set.
    #[error("data set is empty")]
    EmptyDataSet,
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
    /// A constant could not be represented in the network's float type.
    #[error("numeric conversion failed")]
    NumericCast,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// One fully connected layer: `output = input · weights + bias`.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Dense<F: Float> {
    /// Shape `(inputs, outputs)`.
    pub weights: Array2<F>,
    pub bias: Array1<F>,
}

/// A multi-layer perceptron classifier.
///
/// Hidden layers use ReLU, the output layer is a softmax over the classes, and
/// training minimises cross-entropy with mini-batch SGD.
///
/// # Type Parameters
///
/// * `F`: The float type for weights and features (e.g., `f32`, `f64`).
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct Mlp<F: Float> {
    layers: Vec<Dense<F>>,
}

fn scalar<F: Float>(x: f64) -> Result<F, MlpError> {
    F::from_f64(x).ok_or(MlpError::NumericCast)
}

fn count<F: Float>(n: usize) -> Result<F, MlpError> {
    F::from_usize(n).ok_or(MlpError::NumericCast)
}

/// Row-wise softmax, shifted by the row maximum for stability.
fn softmax<F: Float>(mut z: Array2<F>) -> Array2<F> {
    for mut row in z.rows_mut() {
        let max = row.fold(F::neg_infinity(), |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    z
}

impl<F: Float> Mlp<F> {
    /// Creates a network with He-uniform initial weights and zero biases.
    ///
    /// # Arguments
    ///
    /// * `layer_sizes`: Width of every layer, input first and classes last,
    ///   e.g. `[784, 128, 10]`.
    /// * `rng`: Source of randomness for the initial weights.
    ///
    /// # Errors
    ///
    /// Returns `MlpError::InvalidArchitecture` if fewer than two sizes are
    /// given or any size is 0.
    pub fn new<R: Rng>(layer_sizes: &[usize], rng: &mut R) -> Result<Self, MlpError> {
        if layer_sizes.len() < 2 {
            return Err(MlpError::InvalidArchitecture(
                "need at least an input and an output layer".into(),
            ));
        }
        if let Some(pos) = layer_sizes.iter().position(|&s| s == 0) {
            return Err(MlpError::InvalidArchitecture(format!(
                "layer {pos} has zero width"
            )));
        }

        let mut layers = Vec::with_capacity(layer_sizes.len() - 1);
        for pair in layer_sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = scalar::<F>(6.0 / fan_in as f64)?.sqrt();
            let weights = Array2::from_shape_fn((fan_in, fan_out), |_| {
                rng.random_range(-limit..limit)
            });
            layers.push(Dense {
                weights,
                bias: Array1::zeros(fan_out),
            });
        }
        debug!(?layer_sizes, "initialised network");
        Ok(Self { layers })
    }

    /// Builds a network from existing layers, checking that their shapes chain.
    pub fn from_layers(layers: Vec<Dense<F>>) -> Result<Self, MlpError> {
        let model = Self { layers };
        model.validate()?;
        Ok(model)
    }

    pub fn layers(&self) -> &[Dense<F>] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.ncols())
    }

    pub(crate) fn validate(&self) -> Result<(), MlpError> {
        if self.layers.is_empty() {
            return Err(MlpError::InvalidArchitecture("network has no layers".into()));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.nrows() == 0 || layer.weights.ncols() == 0 {
                return Err(MlpError::InvalidArchitecture(format!(
                    "layer {i} has an empty weight matrix"
                )));
            }
            if layer.bias.len() != layer.weights.ncols() {
                return Err(MlpError::InvalidArchitecture(format!(
                    "layer {i} has {} biases for {} outputs",
                    layer.bias.len(),
                    layer.weights.ncols()
                )));
            }
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].weights.ncols() != pair[1].weights.nrows() {
                return Err(MlpError::InvalidArchitecture(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    i,
                    pair[0].weights.ncols(),
                    i + 1,
                    pair[1].weights.nrows()
                )));
            }
        }
        Ok(())
    }

    fn check_input(&self, x: &ArrayView2<F>) -> Result<(), MlpError> {
        if x.ncols() != self.input_dim() {
            return Err(MlpError::DimensionMismatch {
                expected: self.input_dim(),
                found: x.ncols(),
            });
        }
        Ok(())
    }

    /// Runs every layer and returns all activations, input included.
    fn activations(&self, x: ArrayView2<F>) -> Vec<Array2<F>> {
        let last = self.layers.len() - 1;
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(x.to_owned());
        for (i, layer) in self.layers.iter().enumerate() {
            let z = acts[i].dot(&layer.weights) + &layer.bias;
            let a = if i == last {
                softmax(z)
            } else {
                z.mapv(|v| v.max(F::zero()))
            };
            acts.push(a);
        }
        acts
    }

    /// Class probabilities for a batch, one row per input row.
    ///
    /// # Errors
    ///
    /// Returns `MlpError::DimensionMismatch` if `x` does not have
    /// `input_dim()` columns.
    pub fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, MlpError> {
        self.check_input(&x)?;
        let mut acts = self.activations(x);
        acts.pop()
            .ok_or_else(|| MlpError::InvalidArchitecture("network has no layers".into()))
    }

    /// Most likely class for every row of `x`.
    pub fn predict(&self, x: ArrayView2<F>) -> Result<Vec<usize>, MlpError> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .rows()
            .into_iter()
            .map(|row| argmax(row).unwrap_or(0))
            .collect())
    }

    /// Performs one SGD step on a batch and returns its mean cross-entropy.
    ///
    /// The batch is scored before the update, so the returned loss describes
    /// the weights the step started from.
    pub fn train_batch(
        &mut self,
        x: ArrayView2<F>,
        labels: &[usize],
        learning_rate: F,
    ) -> Result<F, MlpError> {
        self.check_input(&x)?;
        let rows = x.nrows();
        if rows == 0 {
            return Err(MlpError::EmptyDataSet);
        }
        if labels.len() != rows {
            return Err(MlpError::LabelCountMismatch {
                labels: labels.len(),
                rows,
            });
        }
        let classes = self.output_dim();
        if let Some(&label) = labels.iter().find(|&&l| l >= classes) {
            return Err(MlpError::InvalidLabel { label, classes });
        }

        let acts = self.activations(x);
        let batch = count::<F>(rows)?;
        let eps = scalar::<F>(1e-12)?;

        // Softmax + cross-entropy gradient: (p - onehot) / batch.
        let mut delta = acts[self.layers.len()].clone();
        let mut loss = F::zero();
        for (i, &label) in labels.iter().enumerate() {
            loss -= (delta[[i, label]] + eps).ln();
            delta[[i, label]] -= F::one();
        }
        delta.mapv_inplace(|d| d / batch);

        for l in (0..self.layers.len()).rev() {
            let grad_w = acts[l].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            let next = if l > 0 {
                let mut d = delta.dot(&self.layers[l].weights.t());
                d.zip_mut_with(&acts[l], |d, &a| {
                    if a <= F::zero() {
                        *d = F::zero();
                    }
                });
                Some(d)
            } else {
                None
            };

            let layer = &mut self.layers[l];
            layer.weights.scaled_add(-learning_rate, &grad_w);
            layer.bias.scaled_add(-learning_rate, &grad_b);

            if let Some(d) = next {
                delta = d;
            }
        }

        Ok(loss / batch)
    }

    fn check_samples(&self, data: &[DataPoint<usize, F>]) -> Result<(), MlpError> {
        if data.is_empty() {
            return Err(MlpError::EmptyDataSet);
        }
        let expected = self.input_dim();
        if let Some(dp) = data.iter().find(|dp| dp.features.len() != expected) {
            return Err(MlpError::DimensionMismatch {
                expected,
                found: dp.features.len(),
            });
        }
        Ok(())
    }

    fn gather(&self, data: &[DataPoint<usize, F>], indices: &[usize]) -> Array2<F> {
        let dim = self.input_dim();
        Array2::from_shape_fn((indices.len(), dim), |(i, j)| {
            data[indices[i]].features[j]
        })
    }

    /// Trains the network and returns the mean loss of every epoch.
    ///
    /// # Errors
    ///
    /// Returns `MlpError::EmptyDataSet` for empty data, `MlpError::InvalidConfig`
    /// for a zero batch size, and the errors of [`Mlp::train_batch`] for
    /// malformed samples.
    pub fn fit<R: Rng>(
        &mut self,
        data: &[DataPoint<usize, F>],
        config: &TrainConfig,
        rng: &mut R,
    ) -> Result<Vec<F>, MlpError> {
        if config.batch_size == 0 {
            return Err(MlpError::InvalidConfig("batch size must be positive".into()));
        }
        self.check_samples(data)?;

        let mut learning_rate = scalar::<F>(config.learning_rate)?;
        let decay = scalar::<F>(config.lr_decay)?;
        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut losses = Vec::with_capacity(config.epochs);

        for epoch in 0..config.epochs {
            if config.shuffle {
                order.shuffle(rng);
            }
            let mut total = F::zero();
            let mut batches = 0;
            for chunk in order.chunks(config.batch_size) {
                let x = self.gather(data, chunk);
                let labels: Vec<usize> = chunk.iter().map(|&i| data[i].label).collect();
                total += self.train_batch(x.view(), &labels, learning_rate)?;
                batches += 1;
            }
            let mean = total / count::<F>(batches)?;
            info!(epoch = epoch + 1, epochs = config.epochs, loss = ?mean, "epoch finished");
            losses.push(mean);
            learning_rate *= decay;
        }
        Ok(losses)
    }

    /// Fraction of samples whose predicted class matches the label.
    pub fn accuracy(&self, data: &[DataPoint<usize, F>]) -> Result<F, MlpError> {
        self.check_samples(data)?;
        let indices: Vec<usize> = (0..data.len()).collect();
        let mut correct = 0usize;
        for chunk in indices.chunks(1024) {
            let predictions = self.predict(self.gather(data, chunk).view())?;
            correct += chunk
                .iter()
                .zip(predictions)
                .filter(|&(&i, p)| data[i].label == p)
                .count();
        }
        Ok(count::<F>(correct)? / count::<F>(data.len())?)
    }
}
