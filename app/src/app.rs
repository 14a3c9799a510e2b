use crate::canvas::{Canvas, InputMapper};
use crate::classifier::Classifier;
use crate::config::PlaygroundConfig;
use crate::export;
use crate::inference::{InferenceWorker, Prediction};
use crate::ui;

use eframe::egui::{self, Key, PointerButton, Pos2, Rect};
use eframe::{App, Frame};
use std::sync::Arc;
use tracing::{info, warn};

/// What a pointer drag currently does to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    None,
    Paint,
    Erase,
}

/// Input the playground reacts to, decoupled from egui's event type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { pos: Pos2, button: PointerButton },
    PointerUp,
    PointerMoved(Pos2),
    /// One wheel notch; positive grows the brush.
    Wheel(f32),
    TogglePrediction,
    PredictOnce,
    Save,
}

impl InputEvent {
    pub fn from_egui(event: &egui::Event) -> Option<Self> {
        match event {
            egui::Event::PointerButton { pos, button, pressed: true, .. } => {
                Some(InputEvent::PointerDown { pos: *pos, button: *button })
            }
            egui::Event::PointerButton { pressed: false, .. } => Some(InputEvent::PointerUp),
            egui::Event::PointerMoved(pos) => Some(InputEvent::PointerMoved(*pos)),
            egui::Event::MouseWheel { delta, .. } if delta.y != 0.0 => {
                Some(InputEvent::Wheel(delta.y.signum()))
            }
            egui::Event::Key { key, pressed: true, repeat: false, .. } => match key {
                Key::Space => Some(InputEvent::TogglePrediction),
                Key::Enter => Some(InputEvent::PredictOnce),
                Key::S => Some(InputEvent::Save),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The application context: owns the grid, the view state and the
/// inference worker for the lifetime of the window.
pub struct PlaygroundApp {
    pub config: PlaygroundConfig,
    pub canvas: Canvas,
    pub mapper: InputMapper,
    pub tool: Tool,
    pub pointer_down: bool,
    pub continuous_prediction: bool,
    pub prediction: Prediction,
    /// Last save outcome, shown under the bars.
    pub status: Option<String>,
    pub classifier_name: String,
    one_shot_requested: bool,
    inference_pending: bool,
    worker: InferenceWorker,
}

impl PlaygroundApp {
    pub fn new(config: PlaygroundConfig, classifier: Arc<dyn Classifier>) -> Self {
        let (cols, rows) = config.grid_size;
        let window = Rect::from_min_size(Pos2::ZERO, config.window_size);
        let mapper = InputMapper::anchored_bottom_right(window, config.canvas_size, cols, rows);
        let num_labels = config.num_labels();

        Self {
            canvas: Canvas::new(cols, rows),
            mapper,
            tool: Tool::None,
            pointer_down: false,
            continuous_prediction: config.continuous_prediction,
            prediction: Prediction::zeros(num_labels),
            status: None,
            classifier_name: classifier.name(),
            one_shot_requested: false,
            inference_pending: false,
            worker: InferenceWorker::new(classifier, num_labels),
            config,
        }
    }

    /// Runs one frame of the loop without drawing anything.
    pub fn step<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = InputEvent>,
    {
        self.canvas.begin_frame();
        for event in events {
            self.handle_event(event);
        }
        self.schedule_inference();
        self.drain_predictions();
    }

    pub fn handle_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { pos, button } => {
                self.pointer_down = true;
                self.tool = match button {
                    PointerButton::Primary => Tool::Paint,
                    PointerButton::Secondary => Tool::Erase,
                    PointerButton::Middle => {
                        self.clear();
                        Tool::None
                    }
                    _ => Tool::None,
                };
                self.apply_tool(pos);
            }
            InputEvent::PointerUp => {
                self.pointer_down = false;
                self.tool = Tool::None;
            }
            InputEvent::PointerMoved(pos) => {
                if self.pointer_down {
                    self.apply_tool(pos);
                }
            }
            InputEvent::Wheel(delta) => self.canvas.adjust_brush(delta),
            InputEvent::TogglePrediction => {
                self.continuous_prediction = !self.continuous_prediction;
                info!(enabled = self.continuous_prediction, "continuous prediction toggled");
            }
            InputEvent::PredictOnce => {
                if !self.continuous_prediction {
                    self.one_shot_requested = true;
                }
            }
            InputEvent::Save => self.save_digit(),
        }
    }

    fn apply_tool(&mut self, pos: Pos2) {
        let hit = self.mapper.map(pos);
        match self.tool {
            Tool::Paint => self.canvas.paint_with_brush(hit),
            Tool::Erase => self.canvas.erase_with_brush(hit),
            Tool::None => {}
        }
    }

    fn clear(&mut self) {
        self.canvas.clear();
        self.prediction = Prediction::zeros(self.config.num_labels());
    }

    /// Starts a classification when one is due and the worker is free.
    ///
    /// A change that arrives while the worker is busy stays pending until a
    /// later frame finds it idle.
    fn schedule_inference(&mut self) {
        if self.canvas.is_updated() && self.continuous_prediction {
            self.inference_pending = true;
        }
        if std::mem::take(&mut self.one_shot_requested) {
            self.inference_pending = true;
        }
        if self.inference_pending
            && self.worker.is_idle()
            && self.worker.submit(self.canvas.snapshot())
        {
            self.inference_pending = false;
        }
    }

    fn drain_predictions(&mut self) {
        if let Some(prediction) = self.worker.try_latest() {
            self.prediction = prediction;
        }
    }

    pub fn is_inference_pending(&self) -> bool {
        self.inference_pending
    }

    pub fn save_digit(&mut self) {
        let path = self.config.export_path.clone();
        self.status = Some(match export::save_grid(self.canvas.grid(), &path) {
            Ok(()) => format!("Saved digit to '{}'", path.display()),
            Err(err) => {
                warn!(%err, "could not save digit");
                format!("Save failed: {err}")
            }
        });
    }
}

impl App for PlaygroundApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let (cols, rows) = self.config.grid_size;
        self.mapper = InputMapper::anchored_bottom_right(
            ctx.screen_rect(),
            self.config.canvas_size,
            cols,
            rows,
        );

        let events: Vec<InputEvent> =
            ctx.input(|i| i.events.iter().filter_map(InputEvent::from_egui).collect());
        self.step(events);

        ui::draw_side_panel(self, ctx);
        ui::draw_central_panel(self, ctx);

        ctx.request_repaint_after(self.config.frame_interval);
    }
}
