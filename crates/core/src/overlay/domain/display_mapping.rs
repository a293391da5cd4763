use crate::detection::domain::detection::{BoundingBox, DetectionSet};

/// Scale from model (native video) pixels to display pixels.
///
/// X and Y scale independently, so a display whose aspect ratio differs from
/// the video stretches the boxes along with the picture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMapping {
    scale_x: f64,
    scale_y: f64,
}

impl DisplayMapping {
    /// Returns `None` while the native size is unknown (zero).
    pub fn new(display: (f64, f64), native: (u32, u32)) -> Option<Self> {
        if native.0 == 0 || native.1 == 0 {
            return None;
        }
        Some(Self {
            scale_x: display.0 / native.0 as f64,
            scale_y: display.1 / native.1 as f64,
        })
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    pub fn map(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            b.origin_x * self.scale_x,
            b.origin_y * self.scale_y,
            b.width * self.scale_x,
            b.height * self.scale_y,
        )
    }
}

/// A detection positioned in display space, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayBox {
    pub rect: BoundingBox,
    pub confidence: f64,
}

impl OverlayBox {
    /// Confidence as a percentage with two decimals, e.g. `95.00%`.
    pub fn label(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// Maps every detection in `set` to display space. Nothing is filtered out.
///
/// Must be called per tick: both the display size and the set's native size
/// may change between ticks.
pub fn layout(set: &DetectionSet, display: (f64, f64)) -> Vec<OverlayBox> {
    let Some(mapping) = DisplayMapping::new(display, set.native_size()) else {
        return Vec::new();
    };
    set.iter()
        .map(|d| OverlayBox {
            rect: mapping.map(&d.bounding_box),
            confidence: d.confidence,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::time::Duration;

    fn set(native: (u32, u32), detections: Vec<Detection>) -> DetectionSet {
        DetectionSet::new(detections, Duration::ZERO, native.0, native.1)
    }

    #[test]
    fn test_identity_when_sizes_match() {
        let m = DisplayMapping::new((640.0, 480.0), (640, 480)).unwrap();
        let b = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(m.map(&b), b);
    }

    #[test]
    fn test_axes_scale_independently() {
        let m = DisplayMapping::new((1280.0, 240.0), (640, 480)).unwrap();
        let mapped = m.map(&BoundingBox::new(100.0, 100.0, 50.0, 50.0));
        assert_relative_eq!(mapped.origin_x, 200.0);
        assert_relative_eq!(mapped.origin_y, 50.0);
        assert_relative_eq!(mapped.width, 100.0);
        assert_relative_eq!(mapped.height, 25.0);
    }

    #[rstest]
    #[case((640.0, 480.0))]
    #[case((333.0, 517.0))]
    #[case((1.0, 1.0))]
    fn test_doubling_display_doubles_coordinates(#[case] display: (f64, f64)) {
        let native = (640, 480);
        let b = BoundingBox::new(37.0, 91.0, 120.0, 80.0);
        let single = DisplayMapping::new(display, native).unwrap().map(&b);
        let double = DisplayMapping::new((display.0 * 2.0, display.1 * 2.0), native)
            .unwrap()
            .map(&b);
        assert_relative_eq!(double.origin_x, single.origin_x * 2.0);
        assert_relative_eq!(double.origin_y, single.origin_y * 2.0);
        assert_relative_eq!(double.width, single.width * 2.0);
        assert_relative_eq!(double.height, single.height * 2.0);
    }

    #[test]
    fn test_unknown_native_size_has_no_mapping() {
        assert!(DisplayMapping::new((640.0, 480.0), (0, 480)).is_none());
        assert!(layout(&set((0, 0), vec![]), (640.0, 480.0)).is_empty());
    }

    #[test]
    fn test_layout_keeps_low_confidence_detections() {
        let detections = vec![
            Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.95),
            Detection::new(BoundingBox::new(20.0, 20.0, 10.0, 10.0), 0.1),
        ];
        let boxes = layout(&set((100, 100), detections), (200.0, 200.0));
        assert_eq!(boxes.len(), 2);
        assert_relative_eq!(boxes[1].rect.origin_x, 40.0);
        assert_relative_eq!(boxes[1].confidence, 0.1);
    }

    #[test]
    fn test_label_format() {
        let b = OverlayBox {
            rect: BoundingBox::default(),
            confidence: 0.95,
        };
        assert_eq!(b.label(), "95.00%");
        let b = OverlayBox {
            rect: BoundingBox::default(),
            confidence: 0.123456,
        };
        assert_eq!(b.label(), "12.35%");
    }
}
