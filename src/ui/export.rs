use std::path::Path;

use anyhow::{Context, Result, bail};
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::color::HeatImage;
use crate::state::RasterView;

/// Exported images are scaled up to at least this many pixels wide.
const MIN_EXPORT_WIDTH: u32 = 480;

/// Write the raster heat map as a PNG, one block of pixels per position.
pub fn write_raster_png(path: &Path, view: &RasterView, ceiling: Option<f64>) -> Result<()> {
    let heat = HeatImage::from_matrix(&view.matrix, ceiling);
    if heat.width == 0 || heat.height == 0 {
        bail!("raster image is empty");
    }
    let (width, height) = (heat.width as u32, heat.height as u32);
    let raw = RgbImage::from_raw(width, height, heat.rgb_bytes())
        .context("raster pixel buffer has the wrong size")?;

    let factor = (MIN_EXPORT_WIDTH / width).max(1);
    let scaled = imageops::resize(&raw, width * factor, height * factor, FilterType::Nearest);
    scaled
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Matrix;
    use tempfile::TempDir;

    fn view(rows: usize, cols: usize) -> RasterView {
        RasterView {
            matrix: Matrix {
                rows,
                cols,
                data: (0..rows * cols).map(|v| v as f64).collect(),
            },
            x_axis: Vec::new(),
            z_axis: Vec::new(),
            title: String::new(),
        }
    }

    #[test]
    fn png_is_scaled_by_whole_pixels() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("raster.png");
        write_raster_png(&path, &view(10, 4), None).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (480, 192));
    }

    #[test]
    fn empty_raster_is_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("raster.png");
        assert!(write_raster_png(&path, &view(0, 0), None).is_err());
    }
}
