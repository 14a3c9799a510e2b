use std::path::PathBuf;
use std::time::Duration;

use eframe::egui::Vec2;
use mnist_playground::{IMAGE_SIDE, NUM_CLASSES};

/// Fixed settings of the playground window. There is no config file; every
/// value here is a compile-time choice gathered in one place.
#[derive(Debug, Clone)]
pub struct PlaygroundConfig {
    pub title: &'static str,
    pub window_size: Vec2,
    /// The canvas sits in the bottom-right corner of the window.
    pub canvas_size: Vec2,
    /// Grid columns and rows.
    pub grid_size: (usize, usize),
    /// One entry per classifier output, in output order.
    pub labels: Vec<String>,
    pub model_path: PathBuf,
    pub export_path: PathBuf,
    pub frame_interval: Duration,
    /// Whether inference runs after every stroke at startup.
    pub continuous_prediction: bool,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            title: "MNIST Playground",
            window_size: Vec2::new(850.0, 560.0),
            canvas_size: Vec2::new(560.0, 560.0),
            grid_size: (IMAGE_SIDE, IMAGE_SIDE),
            labels: (0..NUM_CLASSES).map(|d| d.to_string()).collect(),
            model_path: PathBuf::from("mnist_model.json"),
            export_path: PathBuf::from("digit.png"),
            frame_interval: Duration::from_secs_f64(1.0 / 60.0),
            continuous_prediction: true,
        }
    }
}

impl PlaygroundConfig {
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Width of the area left of the canvas, used for the confidence panel.
    pub fn side_panel_width(&self) -> f32 {
        (self.window_size.x - self.canvas_size.x).max(0.0)
    }
}
