use std::path::Path;

use mlp::{Mlp, MlpError};
use ndarray::{Array2, ArrayView4};
use thiserror::Error;

/// Errors a classifier can report for a single batch.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The batch does not have the spatial size the model was trained on.
    #[error("expected {expected} values per image, got a batch of shape {found:?}")]
    Shape { expected: usize, found: [usize; 4] },
    #[error(transparent)]
    Model(#[from] MlpError),
}

/// The interface the playground needs from a trained model.
///
/// Input is a batch of normalised single-channel images in NHWC layout
/// (`[batch, rows, cols, 1]`); output is one probability row per image.
pub trait Classifier: Send + Sync {
    fn predict(&self, batch: ArrayView4<f32>) -> Result<Array2<f32>, ClassifierError>;

    /// Return the name of the classifier (e.g., "MLP 784-128-10").
    fn name(&self) -> String;
}

/// Adapter that feeds flattened images to an [`Mlp`].
pub struct MlpClassifier {
    model: Mlp<f32>,
}

impl MlpClassifier {
    pub fn new(model: Mlp<f32>) -> Self {
        Self { model }
    }

    /// Loads a model written by the `train` binary.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        Ok(Self::new(Mlp::load(path)?))
    }
}

impl Classifier for MlpClassifier {
    fn predict(&self, batch: ArrayView4<f32>) -> Result<Array2<f32>, ClassifierError> {
        let (n, rows, cols, channels) = batch.dim();
        let per_image = rows * cols * channels;
        if per_image != self.model.input_dim() {
            return Err(ClassifierError::Shape {
                expected: self.model.input_dim(),
                found: [n, rows, cols, channels],
            });
        }
        // Row-major NHWC flattening, the same order the IDX files store pixels in.
        let flat = Array2::from_shape_fn((n, per_image), |(i, j)| {
            batch[[i, j / (cols * channels), (j / channels) % cols, j % channels]]
        });
        Ok(self.model.predict_proba(flat.view())?)
    }

    fn name(&self) -> String {
        let widths: Vec<String> = std::iter::once(self.model.input_dim())
            .chain(self.model.layers().iter().map(|l| l.weights.ncols()))
            .map(|w| w.to_string())
            .collect();
        format!("MLP {}", widths.join("-"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use ndarray::Array1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed distribution and counts how often it was asked.
    pub(crate) struct FixedClassifier {
        pub output: Array1<f32>,
        pub calls: AtomicUsize,
    }

    impl FixedClassifier {
        pub(crate) fn new(output: Array1<f32>) -> Self {
            Self {
                output,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, batch: ArrayView4<f32>) -> Result<Array2<f32>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = batch.dim().0;
            Ok(Array2::from_shape_fn((n, self.output.len()), |(_, j)| self.output[j]))
        }

        fn name(&self) -> String {
            "fixed".to_string()
        }
    }

    /// Always fails, to exercise the error path.
    pub(crate) struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn predict(&self, _batch: ArrayView4<f32>) -> Result<Array2<f32>, ClassifierError> {
            Err(ClassifierError::Model(MlpError::EmptyDataSet))
        }

        fn name(&self) -> String {
            "broken".to_string()
        }
    }

    /// Panics inside `predict`.
    pub(crate) struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn predict(&self, _batch: ArrayView4<f32>) -> Result<Array2<f32>, ClassifierError> {
            panic!("model exploded")
        }

        fn name(&self) -> String {
            "panicking".to_string()
        }
    }
}
