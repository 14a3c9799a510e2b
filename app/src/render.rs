use ecolor::Color32;
use eframe::egui::Painter;
use ndarray::Array2;

use crate::canvas::InputMapper;

pub const GAMMA: f32 = 2.2;
pub const BACKGROUND: Color32 = Color32::from_rgb(30, 30, 30);
pub const TEXT_COLOR: Color32 = Color32::from_rgb(245, 245, 245);
pub const DIM_TEXT_COLOR: Color32 = Color32::from_rgb(180, 180, 180);

/// Full-confidence bar length in points.
pub const BAR_MAX_WIDTH: f32 = 150.0;
pub const BAR_HEIGHT: f32 = 14.0;
/// Confidences at or below this get no percentage label.
pub const PERCENT_LABEL_THRESHOLD: f32 = 0.009;

/// Display luminance of a linear ink intensity.
pub fn gamma_correct(value: f32) -> u8 {
    (value.clamp(0.0, 1.0).powf(1.0 / GAMMA) * 255.0).round() as u8
}

pub fn cell_color(value: f32) -> Color32 {
    Color32::from_gray(gamma_correct(value))
}

/// Draws one solid block per grid cell.
pub fn paint_grid(painter: &Painter, mapper: &InputMapper, grid: &Array2<f32>) {
    for ((x, y), &value) in grid.indexed_iter() {
        painter.rect_filled(mapper.cell_rect(x, y), 0.0, cell_color(value));
    }
}

fn hue_channel(m1: f32, m2: f32, hue: f32) -> f32 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// Converts HLS (all components in [0, 1]) straight to sRGB channels in [0, 1].
fn hls_to_rgb(h: f32, l: f32, s: f32) -> [f32; 3] {
    if s == 0.0 {
        return [l; 3];
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    [
        hue_channel(m1, m2, h + 1.0 / 3.0),
        hue_channel(m1, m2, h),
        hue_channel(m1, m2, h - 1.0 / 3.0),
    ]
}

/// Pastel red at 0 through yellow to green at 1.
pub fn confidence_color(confidence: f32) -> Color32 {
    let hue = confidence.clamp(0.0, 1.0) * 126.0 / 360.0;
    let [r, g, b] = hls_to_rgb(hue, 0.84, 1.0).map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color32::from_rgb(r, g, b)
}

pub fn bar_width(confidence: f32) -> f32 {
    confidence.clamp(0.0, 1.0) * BAR_MAX_WIDTH
}

pub fn percent_label(confidence: f32) -> Option<String> {
    (confidence > PERCENT_LABEL_THRESHOLD).then(|| format!("{:.2}%", confidence * 100.0))
}
