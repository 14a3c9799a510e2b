use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;

use ndarray::{Array1, Array2, Array4, ArrayView1};
use tracing::{debug, error, trace, warn};

use crate::classifier::Classifier;

/// Class probabilities shown in the confidence bars.
///
/// The length always equals the number of labels the app was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    probabilities: Array1<f32>,
}

impl Prediction {
    pub fn zeros(num_labels: usize) -> Self {
        Self {
            probabilities: Array1::zeros(num_labels),
        }
    }

    /// `None` if `probabilities` does not have exactly `num_labels` entries.
    pub fn from_probabilities(probabilities: Array1<f32>, num_labels: usize) -> Option<Self> {
        (probabilities.len() == num_labels).then_some(Self { probabilities })
    }

    pub fn probabilities(&self) -> ArrayView1<'_, f32> {
        self.probabilities.view()
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_zero(&self) -> bool {
        self.probabilities.iter().all(|&p| p == 0.0)
    }

    /// Most likely label index and its probability, if anything was predicted.
    pub fn top(&self) -> Option<(usize, f32)> {
        if self.is_zero() {
            return None;
        }
        mnist_playground::argmax(self.probabilities.view()).map(|i| (i, self.probabilities[i]))
    }
}

/// Reorders a `[x, y]` grid into a `[1, rows, cols, 1]` image batch.
pub fn to_batch(grid: &Array2<f32>) -> Array4<f32> {
    let image = grid.t();
    let (rows, cols) = image.dim();
    Array4::from_shape_fn((1, rows, cols, 1), |(_, r, c, _)| image[[r, c]])
}

/// Classifies one grid snapshot.
///
/// A blank grid short-circuits to zeros without calling the classifier.
/// Errors, panics and malformed outputs are logged and also yield zeros.
pub fn classify(
    classifier: &dyn Classifier,
    snapshot: &Array2<f32>,
    num_labels: usize,
) -> Prediction {
    if snapshot.iter().all(|&v| v == 0.0) {
        trace!("blank grid, skipping classifier");
        return Prediction::zeros(num_labels);
    }

    let batch = to_batch(snapshot);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| classifier.predict(batch.view())));
    match outcome {
        Ok(Ok(probabilities)) => {
            let row = probabilities.outer_iter().next().map(|row| row.to_owned());
            match row.and_then(|row| Prediction::from_probabilities(row, num_labels)) {
                Some(prediction) => prediction,
                None => {
                    error!(
                        shape = ?probabilities.dim(),
                        num_labels,
                        "classifier returned a malformed prediction"
                    );
                    Prediction::zeros(num_labels)
                }
            }
        }
        Ok(Err(err)) => {
            error!(%err, classifier = %classifier.name(), "prediction failed");
            Prediction::zeros(num_labels)
        }
        Err(_) => {
            error!(classifier = %classifier.name(), "classifier panicked");
            Prediction::zeros(num_labels)
        }
    }
}

/// Runs at most one classification at a time on a background thread.
///
/// The owner submits snapshots while [`InferenceWorker::is_idle`] and polls
/// results with [`InferenceWorker::try_latest`]; neither call blocks.
pub struct InferenceWorker {
    classifier: Arc<dyn Classifier>,
    num_labels: usize,
    sender: mpsc::SyncSender<Prediction>,
    receiver: mpsc::Receiver<Prediction>,
    handle: Option<thread::JoinHandle<()>>,
}

impl InferenceWorker {
    pub fn new(classifier: Arc<dyn Classifier>, num_labels: usize) -> Self {
        // One slot is enough: a new job only starts once the last one finished.
        let (sender, receiver) = mpsc::sync_channel(1);
        Self {
            classifier,
            num_labels,
            sender,
            receiver,
            handle: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// Starts classifying `snapshot` unless a job is still running.
    ///
    /// Returns whether a job was started.
    pub fn submit(&mut self, snapshot: Array2<f32>) -> bool {
        if !self.is_idle() {
            trace!("inference busy, deferring");
            return false;
        }
        if let Some(finished) = self.handle.take() {
            if finished.join().is_err() {
                warn!("previous inference thread panicked");
            }
        }

        let classifier = Arc::clone(&self.classifier);
        let sender = self.sender.clone();
        let num_labels = self.num_labels;
        let spawned = thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                let prediction = classify(&*classifier, &snapshot, num_labels);
                if sender.send(prediction).is_err() {
                    debug!("prediction dropped, receiver gone");
                }
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(err) => {
                error!(%err, "failed to spawn inference thread");
                false
            }
        }
    }

    /// Drains every finished prediction and returns the newest one.
    pub fn try_latest(&self) -> Option<Prediction> {
        self.receiver.try_iter().last()
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // The slot may still hold an undelivered result; empty it so the
            // thread's send cannot block.
            while self.receiver.try_recv().is_ok() {}
            if handle.join().is_err() {
                warn!("inference thread panicked during shutdown");
            }
        }
    }
}
