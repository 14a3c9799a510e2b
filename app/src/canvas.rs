use eframe::egui::{Pos2, Rect, Vec2};
use ndarray::Array2;
use std::ops::RangeInclusive;

pub const MIN_BRUSH_RADIUS: f32 = 0.5;
pub const MAX_BRUSH_RADIUS: f32 = 1.3;
pub const DEFAULT_BRUSH_RADIUS: f32 = 1.0;
/// Radius change per wheel notch.
pub const BRUSH_STEP: f32 = 0.5;
/// Ink deposited by a stroke landing on a cell centre.
const PAINT_STRENGTH: f32 = 1.5;

/// Brush size in grid cells, always within [`MIN_BRUSH_RADIUS`, `MAX_BRUSH_RADIUS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    radius: f32,
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(DEFAULT_BRUSH_RADIUS)
    }
}

impl Brush {
    pub fn new(radius: f32) -> Self {
        Self {
            radius: radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Moves the radius by `delta` wheel units.
    pub fn adjust(&mut self, delta: f32) {
        self.radius = (self.radius + delta * BRUSH_STEP).clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
    }
}

/// Where a pointer lands on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellHit {
    /// Target cell, always inside the grid.
    pub cell: (usize, usize),
    /// Unclamped position in cell units; `(x + 0.5, y + 0.5)` is the centre of cell `(x, y)`.
    pub exact: (f32, f32),
}

/// Maps window coordinates onto the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputMapper {
    rect: Rect,
    cols: usize,
    rows: usize,
}

fn clamp_index(exact: f32, len: usize) -> usize {
    (exact.floor() as isize).clamp(0, len as isize - 1) as usize
}

impl InputMapper {
    pub fn new(rect: Rect, cols: usize, rows: usize) -> Self {
        Self { rect, cols, rows }
    }

    /// Places a canvas of `canvas_size` against the bottom-right corner of `window`.
    pub fn anchored_bottom_right(
        window: Rect,
        canvas_size: Vec2,
        cols: usize,
        rows: usize,
    ) -> Self {
        Self::new(Rect::from_min_size(window.max - canvas_size, canvas_size), cols, rows)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn cell_size(&self) -> Vec2 {
        Vec2::new(
            self.rect.width() / self.cols as f32,
            self.rect.height() / self.rows as f32,
        )
    }

    /// Screen rectangle covered by cell `(x, y)`.
    pub fn cell_rect(&self, x: usize, y: usize) -> Rect {
        let size = self.cell_size();
        let min = self.rect.min + Vec2::new(x as f32 * size.x, y as f32 * size.y);
        Rect::from_min_size(min, size)
    }

    /// Never fails: positions off the canvas land on the nearest edge cell.
    pub fn map(&self, pos: Pos2) -> CellHit {
        let size = self.cell_size();
        let exact_x = (pos.x - self.rect.min.x) / size.x;
        let exact_y = (pos.y - self.rect.min.y) / size.y;
        CellHit {
            cell: (clamp_index(exact_x, self.cols), clamp_index(exact_y, self.rows)),
            exact: (exact_x, exact_y),
        }
    }
}

/// The drawing surface: ink intensities in [0, 1] indexed `[x, y]`.
#[derive(Debug, Clone)]
pub struct Canvas {
    grid: Array2<f32>,
    brush: Brush,
    updated: bool,
}

impl Canvas {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            grid: Array2::zeros((cols, rows)),
            brush: Brush::default(),
            updated: false,
        }
    }

    pub fn grid(&self) -> &Array2<f32> {
        &self.grid
    }

    /// Owned copy of the grid for handing to another thread.
    pub fn snapshot(&self) -> Array2<f32> {
        self.grid.clone()
    }

    pub fn brush(&self) -> Brush {
        self.brush
    }

    pub fn adjust_brush(&mut self, delta: f32) {
        self.brush.adjust(delta);
    }

    /// True if a stroke changed a cell, or the grid was cleared, since
    /// [`Canvas::begin_frame`].
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn begin_frame(&mut self) {
        self.updated = false;
    }

    pub fn is_blank(&self) -> bool {
        self.grid.iter().all(|&v| v == 0.0)
    }

    /// Cells within `ceil(radius)` of `cell` on each axis, clipped to the grid.
    fn span(
        &self,
        (gx, gy): (usize, usize),
        radius: f32,
    ) -> (RangeInclusive<usize>, RangeInclusive<usize>) {
        let (cols, rows) = self.grid.dim();
        let reach = radius.ceil() as usize;
        (
            gx.saturating_sub(reach)..=(gx + reach).min(cols - 1),
            gy.saturating_sub(reach)..=(gy + reach).min(rows - 1),
        )
    }

    fn set(&mut self, x: usize, y: usize, value: f32) {
        let cell = &mut self.grid[[x, y]];
        if *cell != value {
            *cell = value;
            self.updated = true;
        }
    }

    fn deposit(&mut self, x: usize, y: usize, amount: f32) {
        let value = (self.grid[[x, y]] + amount).min(1.0);
        self.set(x, y, value);
    }

    fn wipe(&mut self, x: usize, y: usize) {
        self.set(x, y, 0.0);
    }

    /// Adds ink around `hit`.
    ///
    /// The stroke strength falls off with the pointer's distance from the
    /// target cell's centre. A radius of at most 1 inks only the target cell;
    /// larger radii ink every cell whose centre is within `radius`, scaled
    /// down linearly towards the brush edge.
    pub fn paint(&mut self, hit: CellHit, radius: f32) {
        let (gx, gy) = hit.cell;
        let (ex, ey) = hit.exact;
        let offset = (ex - (gx as f32 + 0.5)).hypot(ey - (gy as f32 + 0.5));
        let amount = PAINT_STRENGTH * (1.0 - offset.min(1.0));

        if radius <= 1.0 {
            self.deposit(gx, gy, amount);
            return;
        }

        let (xs, ys) = self.span(hit.cell, radius);
        for x in xs {
            for y in ys.clone() {
                let dist = (x as f32 + 0.5 - ex).hypot(y as f32 + 0.5 - ey);
                if dist <= radius {
                    self.deposit(x, y, amount * (1.0 - dist / radius));
                }
            }
        }
    }

    /// Zeroes the target cell, or for radii above 1 every cell whose grid
    /// distance to the target is within `radius`. No falloff.
    pub fn erase(&mut self, hit: CellHit, radius: f32) {
        let (gx, gy) = hit.cell;
        if radius <= 1.0 {
            self.wipe(gx, gy);
            return;
        }

        let (xs, ys) = self.span(hit.cell, radius);
        for x in xs {
            for y in ys.clone() {
                let dist = (x as f32 - gx as f32).hypot(y as f32 - gy as f32);
                if dist <= radius {
                    self.wipe(x, y);
                }
            }
        }
    }

    pub fn paint_with_brush(&mut self, hit: CellHit) {
        self.paint(hit, self.brush.radius());
    }

    pub fn erase_with_brush(&mut self, hit: CellHit) {
        self.erase(hit, self.brush.radius());
    }

    pub fn clear(&mut self) {
        self.grid.fill(0.0);
        self.updated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mapper() -> InputMapper {
        InputMapper::new(
            Rect::from_min_size(Pos2::new(290.0, 0.0), Vec2::new(560.0, 560.0)),
            28,
            28,
        )
    }

    fn centre_of(x: usize, y: usize) -> CellHit {
        CellHit {
            cell: (x, y),
            exact: (x as f32 + 0.5, y as f32 + 0.5),
        }
    }

    fn changed_cells(before: &Array2<f32>, after: &Array2<f32>) -> Vec<(usize, usize)> {
        before
            .indexed_iter()
            .filter(|&(idx, &v)| after[idx] != v)
            .map(|(idx, _)| idx)
            .collect()
    }

    #[test]
    fn test_mapper_finds_cell_and_offset() {
        let hit = mapper().map(Pos2::new(290.0 + 14.5 * 20.0, 3.25 * 20.0));
        assert_eq!(hit.cell, (14, 3));
        assert_abs_diff_eq!(hit.exact.0, 14.5, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.exact.1, 3.25, epsilon = 1e-4);
    }

    #[test]
    fn test_mapper_clamps_off_canvas_positions() {
        let m = mapper();
        assert_eq!(m.map(Pos2::new(10.0, -40.0)).cell, (0, 0));
        assert_eq!(m.map(Pos2::new(2000.0, 900.0)).cell, (27, 27));
        assert_eq!(m.map(Pos2::new(850.0, 560.0)).cell, (27, 27));
    }

    #[test]
    fn test_anchored_canvas_sits_bottom_right() {
        let window = Rect::from_min_size(Pos2::ZERO, Vec2::new(850.0, 560.0));
        let m = InputMapper::anchored_bottom_right(window, Vec2::new(560.0, 560.0), 28, 28);
        assert_eq!(m.rect().min, Pos2::new(290.0, 0.0));
        let expected = Rect::from_min_size(Pos2::new(310.0, 40.0), Vec2::new(20.0, 20.0));
        assert_eq!(m.cell_rect(1, 2), expected);
    }

    #[test]
    fn test_paint_at_cell_centre_saturates_single_cell() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint(centre_of(14, 14), 0.5);

        assert_abs_diff_eq!(canvas.grid()[[14, 14]], 1.0);
        assert_eq!(changed_cells(&Array2::zeros((28, 28)), canvas.grid()), vec![(14, 14)]);
        assert!(canvas.is_updated());
    }

    #[test]
    fn test_small_brush_touches_exactly_one_cell() {
        let mut canvas = Canvas::new(28, 28);
        let m = mapper();
        let strokes = [
            (295.0, 5.0),
            (300.0, 17.0),
            (449.0, 281.0),
            (600.0, 559.0),
            (849.0, 300.0),
        ];
        for radius in [0.5, 0.8, 1.0] {
            for &(x, y) in &strokes {
                let before = canvas.grid().clone();
                let hit = m.map(Pos2::new(x, y));
                canvas.paint(hit, radius);
                let changed = changed_cells(&before, canvas.grid());
                assert!(changed.len() <= 1);
                if before[hit.cell] < 1.0 {
                    assert_eq!(changed, vec![hit.cell]);
                }
                assert!(canvas.grid()[hit.cell] >= before[hit.cell]);
                assert!(canvas.grid().iter().all(|&v| (0.0..=1.0).contains(&v)));
            }
        }
    }

    #[test]
    fn test_paint_falls_off_with_offset() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint(CellHit { cell: (3, 3), exact: (3.9, 3.5) }, 1.0);
        // offset 0.4 from the centre: 1.5 * 0.6
        assert_abs_diff_eq!(canvas.grid()[[3, 3]], 0.9, epsilon = 1e-5);
    }

    #[test]
    fn test_large_brush_paints_a_decaying_disc() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint(centre_of(10, 10), 1.3);
        let grid = canvas.grid();

        assert_abs_diff_eq!(grid[[10, 10]], 1.0);
        // one cell away: 1.5 * (1 - 1 / 1.3)
        assert_abs_diff_eq!(grid[[11, 10]], 1.5 * (1.0 - 1.0 / 1.3), epsilon = 1e-5);
        assert_abs_diff_eq!(grid[[10, 9]], grid[[11, 10]], epsilon = 1e-6);
        // diagonal neighbours are sqrt(2) > 1.3 away
        assert_eq!(grid[[11, 11]], 0.0);
        assert_eq!(grid[[12, 10]], 0.0);
        assert!(grid.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_repeated_strokes_never_exceed_one() {
        let mut canvas = Canvas::new(28, 28);
        for _ in 0..10 {
            canvas.paint(centre_of(0, 0), 1.3);
            canvas.paint(CellHit { cell: (27, 27), exact: (27.1, 27.9) }, 2.5);
        }
        assert!(canvas.grid().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_erase_disc_zeroes_cells_within_radius() {
        let mut canvas = Canvas::new(28, 28);
        for x in 6..=14 {
            for y in 6..=14 {
                canvas.paint(centre_of(x, y), 0.5);
            }
        }
        canvas.erase(centre_of(10, 10), 2.0);

        for x in 6..=14usize {
            for y in 6..=14usize {
                let dist = ((x as f32 - 10.0).powi(2) + (y as f32 - 10.0).powi(2)).sqrt();
                if dist <= 2.0 {
                    assert_eq!(canvas.grid()[[x, y]], 0.0, "cell ({x}, {y})");
                } else {
                    assert_eq!(canvas.grid()[[x, y]], 1.0, "cell ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_small_eraser_zeroes_only_target() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint(centre_of(5, 5), 1.3);
        let before = canvas.grid().clone();
        canvas.erase(CellHit { cell: (5, 5), exact: (5.9, 5.1) }, 1.0);

        assert_eq!(canvas.grid()[[5, 5]], 0.0);
        assert_eq!(changed_cells(&before, canvas.grid()), vec![(5, 5)]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint(centre_of(1, 1), 1.3);
        canvas.paint(centre_of(20, 7), 1.0);
        canvas.begin_frame();
        canvas.clear();

        assert!(canvas.is_blank());
        assert!(canvas.grid().iter().all(|&v| v == 0.0));
        assert!(canvas.is_updated());
    }

    #[test]
    fn test_brush_radius_stays_clamped() {
        let mut canvas = Canvas::new(28, 28);
        for _ in 0..50 {
            canvas.adjust_brush(1.0);
        }
        assert_abs_diff_eq!(canvas.brush().radius(), MAX_BRUSH_RADIUS);
        for _ in 0..50 {
            canvas.adjust_brush(-3.0);
        }
        assert_abs_diff_eq!(canvas.brush().radius(), MIN_BRUSH_RADIUS);
        canvas.adjust_brush(1.0);
        assert_abs_diff_eq!(canvas.brush().radius(), 1.0);
        assert_abs_diff_eq!(Brush::new(9.0).radius(), MAX_BRUSH_RADIUS);
    }

    #[test]
    fn test_strokes_that_change_nothing_leave_flag_down() {
        let mut canvas = Canvas::new(28, 28);
        // Dragged off the left edge: clamped to column 0 but a full cell away.
        canvas.paint(CellHit { cell: (0, 5), exact: (-1.5, 5.5) }, 1.0);
        assert!(!canvas.is_updated());
        assert!(canvas.is_blank());

        canvas.erase(centre_of(7, 7), 1.3);
        assert!(!canvas.is_updated());

        canvas.paint(centre_of(7, 7), 0.5);
        canvas.begin_frame();
        canvas.paint(centre_of(7, 7), 0.5);
        assert!(!canvas.is_updated(), "saturated cell stays at 1.0");
    }

    #[test]
    fn test_begin_frame_clears_update_flag() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint_with_brush(centre_of(2, 2));
        assert!(canvas.is_updated());
        canvas.begin_frame();
        assert!(!canvas.is_updated());
        canvas.erase_with_brush(centre_of(2, 2));
        assert!(canvas.is_updated());
    }
}
