// Offline trainer for the playground's digit classifier.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::{GrayImage, Luma};
use ndarray::Axis;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mnist_playground::dataset::{self, Split};
use mnist_playground::{DataPoint, Mlp, TrainConfig, IMAGE_PIXELS, IMAGE_SIDE, NUM_CLASSES};

/// Number of digits in each sample strip.
const SAMPLE_COUNT: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "train", about = "Train the MNIST playground classifier")]
struct Args {
    /// Directory holding the four MNIST IDX files (optionally gzipped).
    #[arg(long, default_value = "training_data")]
    data_dir: PathBuf,
    #[arg(long, default_value_t = 10)]
    epochs: usize,
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,
    /// Learning rate multiplier applied after every epoch.
    #[arg(long, default_value_t = 1.0)]
    lr_decay: f64,
    /// Hidden layer widths, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "128")]
    hidden: Vec<usize>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Where the trained model is written.
    #[arg(long, default_value = "mnist_model.json")]
    output: PathBuf,
    /// Preview of random training digits, written before training starts.
    #[arg(long, default_value = "mnist_samples.png")]
    samples: PathBuf,
    /// Random test digits with their predicted classes, written after training.
    #[arg(long, default_value = "mnist_samples_predictions.png")]
    predictions: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(?args, "starting training");

    let train = dataset::load_split(&args.data_dir, Split::Train)
        .with_context(|| format!("loading training split from {}", args.data_dir.display()))?;
    let test = dataset::load_split(&args.data_dir, Split::Test)
        .with_context(|| format!("loading test split from {}", args.data_dir.display()))?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(args.seed);
    write_preview(&train, &args.samples, &mut rng)?;

    let mut sizes = vec![IMAGE_PIXELS];
    sizes.extend(&args.hidden);
    sizes.push(NUM_CLASSES);
    let mut model = Mlp::<f32>::new(&sizes, &mut rng)?;

    let config = TrainConfig::default()
        .with_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_learning_rate(args.learning_rate)
        .with_lr_decay(args.lr_decay);
    model.fit(&train, &config, &mut rng)?;

    let accuracy = model.accuracy(&test)?;
    info!(accuracy, samples = test.len(), "evaluated on test split");

    model
        .save(&args.output)
        .with_context(|| format!("saving model to {}", args.output.display()))?;
    info!(path = %args.output.display(), "model saved");

    write_predictions(&model, &test, &args.predictions, &mut rng)?;
    Ok(())
}

/// Tile width per digit: the image plus a two pixel gutter.
const TILE_WIDTH: usize = IMAGE_SIDE + 2;
/// Side of one class marker in the band below each digit.
const MARK: usize = 3;

/// Lays digits out left to right, each above a marker band.
///
/// The band has one row of `NUM_CLASSES` markers lighting the true label and,
/// when predictions are given, a second row lighting the predicted class.
fn digit_strip(digits: &[(&DataPoint<usize, f32>, Option<usize>)]) -> GrayImage {
    let marker_rows = if digits.iter().any(|(_, p)| p.is_some()) { 2 } else { 1 };
    let height = IMAGE_SIDE + 1 + marker_rows * MARK;
    let mut strip = GrayImage::new((TILE_WIDTH * digits.len()) as u32, height as u32);

    for (slot, (sample, predicted)) in digits.iter().enumerate() {
        let left = slot * TILE_WIDTH;
        for (p, &v) in sample.features.iter().enumerate() {
            let (x, y) = (p % IMAGE_SIDE, p / IMAGE_SIDE);
            let level = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            strip.put_pixel((left + x) as u32, y as u32, Luma([level]));
        }

        let marks = std::iter::once(Some(sample.label)).chain(std::iter::once(*predicted));
        for (row, class) in marks.take(marker_rows).enumerate() {
            let top = IMAGE_SIDE + 1 + row * MARK;
            for c in 0..NUM_CLASSES {
                let level = if Some(c) == class { 255 } else { 60 };
                for dx in 0..MARK {
                    for dy in 0..MARK - 1 {
                        let x = left + c * MARK + dx;
                        strip.put_pixel(x as u32, (top + dy) as u32, Luma([level]));
                    }
                }
            }
        }
    }
    strip
}

fn pick<'a, R: Rng>(
    samples: &'a [DataPoint<usize, f32>],
    rng: &mut R,
) -> Vec<&'a DataPoint<usize, f32>> {
    index::sample(rng, samples.len(), SAMPLE_COUNT.min(samples.len()))
        .into_iter()
        .map(|i| &samples[i])
        .collect()
}

fn save_strip(strip: &GrayImage, path: &Path) -> Result<()> {
    strip
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "sample strip saved");
    Ok(())
}

/// Stores a few random training digits with their labels.
fn write_preview<R: Rng>(train: &[DataPoint<usize, f32>], path: &Path, rng: &mut R) -> Result<()> {
    let digits: Vec<_> = pick(train, rng).into_iter().map(|s| (s, None)).collect();
    save_strip(&digit_strip(&digits), path)
}

/// Predicts a few random test digits, logs the results and stores the
/// digits with their labels and predictions.
fn write_predictions<R: Rng>(
    model: &Mlp<f32>,
    test: &[DataPoint<usize, f32>],
    path: &Path,
    rng: &mut R,
) -> Result<()> {
    let mut digits = Vec::new();
    for sample in pick(test, rng) {
        let predicted = model
            .predict(sample.features.view().insert_axis(Axis(0)))?
            .first()
            .copied();
        info!(label = sample.label, ?predicted, "sample prediction");
        digits.push((sample, predicted));
    }
    save_strip(&digit_strip(&digits), path)
}
