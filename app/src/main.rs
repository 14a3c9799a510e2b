mod app;
mod canvas;
mod classifier;
mod config;
mod export;
mod inference;
mod render;
mod ui;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::PlaygroundApp;
use classifier::{Classifier, MlpClassifier};
use config::PlaygroundConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PlaygroundConfig::default();
    let classifier = MlpClassifier::load(&config.model_path).with_context(|| {
        format!(
            "could not load model from '{}'; run the `train` binary first",
            config.model_path.display()
        )
    })?;
    info!(model = %classifier.name(), path = %config.model_path.display(), "classifier ready");
    let classifier: Arc<dyn Classifier> = Arc::new(classifier);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config.title)
            .with_inner_size(config.window_size)
            .with_resizable(false),
        ..Default::default()
    };

    let title = config.title;
    eframe::run_native(
        title,
        native_options,
        Box::new(move |_cc| Ok(Box::new(PlaygroundApp::new(config, classifier)))),
    )
    .map_err(|e| anyhow!("{e}"))
}
