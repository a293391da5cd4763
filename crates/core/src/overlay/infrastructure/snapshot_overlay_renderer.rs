use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::overlay::domain::display_mapping::OverlayBox;
use crate::overlay::infrastructure::bitmap_font::{self, text_height, text_width};
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::shared::frame::Frame;

const BORDER_COLOR: [u8; 3] = [255, 0, 0];
const BORDER_WIDTH: u32 = 2;
const LABEL_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_SCALE: u32 = 2;
/// Gap between the bottom of the box and the label backdrop.
const LABEL_OFFSET: i64 = 5;
const LABEL_PAD_X: i64 = 5;
const LABEL_PAD_Y: i64 = 2;

/// Renders the overlay onto a copy of the frame, scaled to display size,
/// and writes it to an image file (overwritten every tick).
pub struct SnapshotOverlayRenderer {
    path: PathBuf,
    display: (u32, u32),
}

impl SnapshotOverlayRenderer {
    pub fn new(path: impl Into<PathBuf>, display: (u32, u32)) -> Self {
        Self {
            path: path.into(),
            display: (display.0.max(1), display.1.max(1)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Draws a hollow rectangle clipped to the canvas.
fn draw_border(canvas: &mut Frame, b: &OverlayBox) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = b.rect.origin_x.round() as i64;
    let y0 = b.rect.origin_y.round() as i64;
    let x1 = (b.rect.origin_x + b.rect.width).round() as i64 - 1;
    let y1 = (b.rect.origin_y + b.rect.height).round() as i64 - 1;
    if x1 < x0 || y1 < y0 {
        return;
    }
    let t = BORDER_WIDTH as i64;

    let mut pixels = canvas.as_ndarray_mut();
    for y in y0.max(0)..=y1.min(ch - 1) {
        for x in x0.max(0)..=x1.min(cw - 1) {
            let on_edge = x - x0 < t || x1 - x < t || y - y0 < t || y1 - y < t;
            if on_edge {
                for (c, &v) in BORDER_COLOR.iter().enumerate() {
                    pixels[[y as usize, x as usize, c]] = v;
                }
            }
        }
    }
}

/// Draws the confidence label below the box on a half-darkened backdrop.
fn draw_label(canvas: &mut Frame, b: &OverlayBox) {
    let text = b.label();
    let x0 = b.rect.origin_x.round() as i64;
    let y0 = (b.rect.origin_y + b.rect.height).round() as i64 + LABEL_OFFSET;
    let x1 = x0 + text_width(&text, LABEL_SCALE) as i64 + 2 * LABEL_PAD_X;
    let y1 = y0 + text_height(LABEL_SCALE) as i64 + 2 * LABEL_PAD_Y;

    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    {
        let mut pixels = canvas.as_ndarray_mut();
        for y in y0.max(0)..y1.min(ch) {
            for x in x0.max(0)..x1.min(cw) {
                for c in 0..3 {
                    pixels[[y as usize, x as usize, c]] /= 2;
                }
            }
        }
    }
    bitmap_font::draw_text(
        canvas,
        x0 + LABEL_PAD_X,
        y0 + LABEL_PAD_Y,
        &text,
        LABEL_COLOR,
        LABEL_SCALE,
    );
}

impl OverlayRenderer for SnapshotOverlayRenderer {
    fn display_size(&self) -> (f64, f64) {
        (self.display.0 as f64, self.display.1 as f64)
    }

    fn render(
        &mut self,
        frame: &Frame,
        boxes: &[OverlayBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let rgb = frame.to_rgb();
        let img = RgbImage::from_raw(rgb.width(), rgb.height(), rgb.data().to_vec())
            .ok_or("Failed to create image from frame data")?;
        let (dw, dh) = self.display;
        let scaled = imageops::resize(&img, dw, dh, FilterType::Triangle);

        let mut canvas = Frame::new(scaled.into_raw(), dw, dh, 3, frame.timestamp());
        for b in boxes {
            draw_border(&mut canvas, b);
            draw_label(&mut canvas, b);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let out = RgbImage::from_raw(dw, dh, canvas.data().to_vec())
            .ok_or("Failed to create image from canvas")?;
        out.save(&self.path)?;
        log::debug!("Overlay with {} box(es) written to {}", boxes.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::BoundingBox;
    use std::time::Duration;

    fn black(width: u32, height: u32) -> Frame {
        Frame::new(
            vec![0u8; (width * height * 3) as usize],
            width,
            height,
            3,
            Duration::ZERO,
        )
    }

    fn overlay(x: f64, y: f64, w: f64, h: f64) -> OverlayBox {
        OverlayBox {
            rect: BoundingBox::new(x, y, w, h),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_border_is_drawn_and_interior_untouched() {
        let mut canvas = black(20, 20);
        draw_border(&mut canvas, &overlay(5.0, 5.0, 10.0, 10.0));
        let px = canvas.as_ndarray();
        assert_eq!(px[[5, 5, 0]], 255);
        assert_eq!(px[[6, 10, 0]], 255);
        assert_eq!(px[[14, 14, 0]], 255);
        assert_eq!(px[[10, 10, 0]], 0);
        assert_eq!(px[[4, 4, 0]], 0);
    }

    #[test]
    fn test_border_is_clipped_to_canvas() {
        let mut canvas = black(10, 10);
        draw_border(&mut canvas, &overlay(-5.0, -5.0, 30.0, 30.0));
        draw_border(&mut canvas, &overlay(50.0, 50.0, 5.0, 5.0));
        assert_eq!(canvas.as_ndarray()[[5, 5, 0]], 0);
    }

    #[test]
    fn test_label_is_drawn_below_box() {
        let mut canvas = black(100, 60);
        let b = overlay(10.0, 10.0, 20.0, 20.0);
        draw_label(&mut canvas, &b);

        let px = canvas.as_ndarray();
        let label_top = 30 + LABEL_OFFSET as usize + LABEL_PAD_Y as usize;
        let label_rows = label_top..label_top + text_height(LABEL_SCALE) as usize;
        let white_below = label_rows
            .flat_map(|y| (0..100).map(move |x| (y, x)))
            .filter(|&(y, x)| px[[y, x, 0]] == 255)
            .count();
        assert!(white_below > 0);

        let white_above = (0..30)
            .flat_map(|y| (0..100).map(move |x| (y, x)))
            .filter(|&(y, x)| px[[y, x, 0]] == 255)
            .count();
        assert_eq!(white_above, 0);
    }

    #[test]
    fn test_label_backdrop_darkens_frame() {
        let mut canvas = Frame::new(vec![200u8; 100 * 60 * 3], 100, 60, 3, Duration::ZERO);
        draw_label(&mut canvas, &overlay(10.0, 10.0, 20.0, 20.0));
        // Padding corner of the backdrop, no glyph there.
        assert_eq!(canvas.as_ndarray()[[35, 10, 0]], 100);
        assert_eq!(canvas.as_ndarray()[[34, 10, 0]], 200);
    }

    #[test]
    fn test_label_below_canvas_is_clipped() {
        let mut canvas = black(40, 40);
        draw_label(&mut canvas, &overlay(0.0, 30.0, 10.0, 10.0));
        assert!(canvas.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_render_writes_scaled_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay").join("live.png");
        let mut renderer = SnapshotOverlayRenderer::new(&path, (40, 30));
        renderer
            .render(&black(80, 60), &[overlay(2.0, 2.0, 10.0, 10.0)])
            .unwrap();

        let written = image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (40, 30));
        assert_eq!(written.get_pixel(2, 2).0, BORDER_COLOR);
        let label_drawn = (17..30)
            .flat_map(|y| (0..40).map(move |x| (x, y)))
            .any(|(x, y)| written.get_pixel(x, y).0 == LABEL_COLOR);
        assert!(label_drawn);
    }

    #[test]
    fn test_display_size_is_at_least_one_pixel() {
        let renderer = SnapshotOverlayRenderer::new("unused.png", (1280, 0));
        assert_eq!(renderer.display_size(), (1280.0, 1.0));
    }
}
