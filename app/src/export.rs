use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use ndarray::Array2;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Renders a `[x, y]` grid as an 8-bit grayscale image, 0 → black, 1 → white.
pub fn grid_to_image(grid: &Array2<f32>) -> GrayImage {
    let (cols, rows) = grid.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let value = grid[[x as usize, y as usize]].clamp(0.0, 1.0);
        Luma([(value * 255.0).round() as u8])
    })
}

/// Writes the grid as a PNG (or whatever format the extension names).
pub fn save_grid(grid: &Array2<f32>, path: &Path) -> Result<(), ExportError> {
    grid_to_image(grid)
        .save(path)
        .map_err(|source| ExportError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), "saved digit image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, CellHit};

    #[test]
    fn test_image_orientation_matches_screen() {
        let mut grid = Array2::zeros((28, 28));
        grid[[5, 1]] = 1.0;
        grid[[0, 27]] = 0.5;
        let image = grid_to_image(&grid);

        assert_eq!(image.dimensions(), (28, 28));
        assert_eq!(image.get_pixel(5, 1), &Luma([255]));
        assert_eq!(image.get_pixel(0, 27), &Luma([128]));
        assert_eq!(image.get_pixel(1, 5), &Luma([0]));
    }

    #[test]
    fn test_saved_image_after_clear_is_uniformly_black() {
        let mut canvas = Canvas::new(28, 28);
        canvas.paint(CellHit { cell: (9, 9), exact: (9.5, 9.5) }, 1.3);
        canvas.clear();

        let path = std::env::temp_dir().join(format!("digit-clear-{}.png", std::process::id()));
        save_grid(canvas.grid(), &path).unwrap();
        let loaded = image::open(&path).unwrap().to_luma8();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.dimensions(), (28, 28));
        assert!(loaded.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_unwritable_path_reports_error() {
        let grid = Array2::zeros((28, 28));
        let path = std::env::temp_dir().join("no-such-dir-for-digit").join("x").join("digit.png");
        assert!(matches!(save_grid(&grid, &path), Err(ExportError::Image { .. })));
    }
}
