use std::time::Duration;

/// Axis-aligned box in pixel units, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(origin_x: f64, origin_y: f64, width: f64, height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// One located face. Carries no identity across ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            bounding_box,
            confidence,
        }
    }
}

/// All detections produced by one poll tick.
///
/// Sets are immutable once built and replace their predecessor wholesale.
/// `native_width`/`native_height` are the dimensions of the frame the boxes
/// were computed on, which is the model-space the overlay maps from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
    timestamp: Duration,
    native_width: u32,
    native_height: u32,
}

impl DetectionSet {
    pub fn new(
        detections: Vec<Detection>,
        timestamp: Duration,
        native_width: u32,
        native_height: u32,
    ) -> Self {
        Self {
            detections,
            timestamp,
            native_width,
            native_height,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn native_size(&self) -> (u32, u32) {
        (self.native_width, self.native_height)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_area() {
        let b = BoundingBox::new(10.0, 10.0, 20.0, 5.0);
        assert_relative_eq!(b.area(), 100.0);
    }

    #[test]
    fn test_negative_extent_has_zero_area() {
        let b = BoundingBox::new(0.0, 0.0, -4.0, 5.0);
        assert_relative_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_empty_set() {
        let set = DetectionSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.native_size(), (0, 0));
    }

    #[test]
    fn test_set_preserves_order() {
        let a = Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.9);
        let b = Detection::new(BoundingBox::new(5.0, 5.0, 1.0, 1.0), 0.4);
        let set = DetectionSet::new(vec![a, b], Duration::from_millis(7), 640, 480);
        let confidences: Vec<f64> = set.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.4]);
        assert_eq!(set.timestamp(), Duration::from_millis(7));
        assert_eq!(set.native_size(), (640, 480));
    }
}
