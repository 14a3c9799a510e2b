use crate::app::{PlaygroundApp, Tool};
use crate::render::{self, BACKGROUND, BAR_HEIGHT, BAR_MAX_WIDTH, DIM_TEXT_COLOR, TEXT_COLOR};

use eframe::egui::{self, Color32, FontId, RichText, Sense, Ui, Vec2};

/// Draws the confidence panel left of the canvas.
pub fn draw_side_panel(app: &PlaygroundApp, ctx: &egui::Context) {
    egui::SidePanel::left("confidence_panel")
        .exact_width(app.config.side_panel_width())
        .resizable(false)
        .frame(egui::Frame::default().fill(BACKGROUND).inner_margin(12.0))
        .show(ctx, |ui| {
            ui.label(RichText::new(app.config.title).size(22.0).color(TEXT_COLOR));
            ui.label(RichText::new(&app.classifier_name).small().color(DIM_TEXT_COLOR));
            ui.add_space(10.0);

            draw_confidence_bars(app, ui);

            ui.add_space(10.0);
            draw_status(app, ui);
            ui.add_space(10.0);
            draw_legend(ui);
        });
}

fn draw_confidence_bars(app: &PlaygroundApp, ui: &mut Ui) {
    let probabilities = app.prediction.probabilities();
    let top = app.prediction.top().map(|(idx, _)| idx);

    for (idx, label) in app.config.labels.iter().enumerate() {
        let confidence = probabilities.get(idx).copied().unwrap_or(0.0);
        ui.horizontal(|ui| {
            let text = RichText::new(label).monospace().size(16.0);
            let text = if top == Some(idx) {
                text.strong().color(TEXT_COLOR)
            } else {
                text.color(DIM_TEXT_COLOR)
            };
            ui.label(text);

            let slot = Vec2::new(BAR_MAX_WIDTH, BAR_HEIGHT);
            let (rect, _) = ui.allocate_exact_size(slot, Sense::hover());
            let filled = Vec2::new(render::bar_width(confidence), BAR_HEIGHT);
            let bar = egui::Rect::from_min_size(rect.min, filled);
            ui.painter().rect_filled(bar, 2.0, render::confidence_color(confidence));

            if let Some(percent) = render::percent_label(confidence) {
                ui.label(RichText::new(percent).size(12.0).color(DIM_TEXT_COLOR));
            }
        });
    }
}

fn draw_status(app: &PlaygroundApp, ui: &mut Ui) {
    let mode = if app.continuous_prediction { "continuous" } else { "on demand" };
    let tool = match app.tool {
        Tool::Paint => "painting",
        Tool::Erase => "erasing",
        Tool::None => "idle",
    };
    let small = |text: String| {
        RichText::new(text)
            .font(FontId::proportional(13.0))
            .color(DIM_TEXT_COLOR)
    };

    ui.label(small(format!("Brush radius: {:.1}", app.canvas.brush().radius())));
    ui.label(small(format!("Prediction: {mode}")));
    ui.label(small(format!("Tool: {tool}")));
    if let Some(status) = &app.status {
        ui.label(small(status.clone()));
    }
}

fn draw_legend(ui: &mut Ui) {
    let lines = [
        ("Left drag", "paint"),
        ("Right drag", "erase"),
        ("Middle click", "clear"),
        ("Wheel", "brush size"),
        ("Space", "toggle continuous"),
        ("Enter", "predict once"),
        ("S", "save digit.png"),
    ];
    egui::Grid::new("legend").num_columns(2).spacing([8.0, 2.0]).show(ui, |ui| {
        for (input, action) in lines {
            ui.label(RichText::new(input).size(12.0).color(Color32::from_gray(150)));
            ui.label(RichText::new(action).size(12.0).color(DIM_TEXT_COLOR));
            ui.end_row();
        }
    });
}

/// Draws the grid into the canvas area.
pub fn draw_central_panel(app: &PlaygroundApp, ctx: &egui::Context) {
    egui::CentralPanel::default()
        .frame(egui::Frame::default().fill(BACKGROUND))
        .show(ctx, |ui| {
            render::paint_grid(ui.painter(), &app.mapper, app.canvas.grid());
        });
}
