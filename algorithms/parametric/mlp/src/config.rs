/// Hyper-parameters for [`Mlp::fit`](crate::Mlp::fit).
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Number of passes over the training data.
    pub epochs: usize,
    /// Samples per gradient step. Must be greater than 0.
    pub batch_size: usize,
    /// Initial step size of plain SGD.
    pub learning_rate: f64,
    /// Multiplicative decay applied to the learning rate after each epoch.
    pub lr_decay: f64,
    /// Reshuffle the sample order at the start of every epoch.
    pub shuffle: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 64,
            learning_rate: 0.1,
            lr_decay: 1.0,
            shuffle: true,
        }
    }
}

impl TrainConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_lr_decay(mut self, lr_decay: f64) -> Self {
        self.lr_decay = lr_decay;
        self
    }
}
