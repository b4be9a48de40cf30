use eframe::egui::Color32;
use palette::{Hsl, Hsv, IntoColor, Srgb};

use crate::data::model::Matrix;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            to_color32(hsl.into_color())
        })
        .collect()
}

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Heat scale for raster images
// ---------------------------------------------------------------------------

/// Blue → cyan → green → yellow → red for `t` in `[0, 1]`.
pub fn heat_color(t: f64) -> Color32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let hue = 240.0 * (1.0 - t as f32);
    let hsv = Hsv::new(hue, 0.85, 0.95);
    to_color32(hsv.into_color())
}

/// Pixels of a raster matrix shown with X along the width and Z along the
/// height, Z increasing upwards.
///
/// Values at or above `ceiling` (default: the matrix maximum) saturate.
pub struct HeatImage {
    pub width: usize,
    pub height: usize,
    pub ceiling: f64,
    pub pixels: Vec<Color32>,
}

impl HeatImage {
    pub fn from_matrix(matrix: &Matrix, ceiling: Option<f64>) -> Self {
        let ceiling = ceiling.filter(|c| *c > 0.0).unwrap_or_else(|| matrix.max());
        let width = matrix.rows;
        let height = matrix.cols;
        let mut pixels = Vec::with_capacity(width * height);
        for py in 0..height {
            let z = height - 1 - py;
            for x in 0..width {
                let t = if ceiling > 0.0 { matrix.get(x, z) / ceiling } else { 0.0 };
                pixels.push(heat_color(t));
            }
        }
        Self {
            width,
            height,
            ceiling,
            pixels,
        }
    }

    /// Packed RGB bytes, row by row from the top.
    pub fn rgb_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|c| [c.r(), c.g(), c.b()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let colours = generate_palette(4);
        assert_eq!(colours.len(), 4);
        assert_ne!(colours[0], colours[2]);
    }

    #[test]
    fn heat_scale_endpoints() {
        let low = heat_color(0.0);
        let high = heat_color(1.0);
        assert!(low.b() > low.r());
        assert!(high.r() > high.b());
        assert_eq!(heat_color(-1.0), low);
        assert_eq!(heat_color(5.0), high);
        assert_eq!(heat_color(f64::NAN), low);
    }

    #[test]
    fn heat_image_is_transposed_with_z_up() {
        // 2 X steps, 3 Z steps
        let matrix = Matrix {
            rows: 2,
            cols: 3,
            data: vec![0.0, 0.0, 60.0, 0.0, 0.0, 0.0],
        };
        let image = HeatImage::from_matrix(&matrix, None);
        assert_eq!((image.width, image.height), (2, 3));
        assert_eq!(image.ceiling, 60.0);
        // (x=0, z=2) is the top-left pixel.
        assert_eq!(image.pixels[0], heat_color(1.0));
        assert_eq!(image.pixels[1], heat_color(0.0));
        assert_eq!(image.rgb_bytes().len(), 2 * 3 * 3);
    }

    #[test]
    fn ceiling_saturates_colours() {
        let matrix = Matrix {
            rows: 1,
            cols: 2,
            data: vec![50.0, 500.0],
        };
        let image = HeatImage::from_matrix(&matrix, Some(100.0));
        // top pixel is z=1 (500 counts), bottom is z=0 (50 counts)
        assert_eq!(image.pixels[0], heat_color(1.0));
        assert_eq!(image.pixels[1], heat_color(0.5));
    }
}
