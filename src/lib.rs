//! Shared pieces of the MNIST playground: numeric helpers, the MNIST IDX
//! loader used by the trainer, and the fixed image geometry the app and the
//! trainer agree on.

pub mod dataset;

pub use mlp::{Mlp, MlpError, TrainConfig};
pub use playground_helpers::{argmax, DataPoint, Float};

/// Width and height of one digit image, in pixels.
pub const IMAGE_SIDE: usize = 28;
/// Number of pixels per image, the classifier's input width.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;
